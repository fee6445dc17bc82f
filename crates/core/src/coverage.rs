use crate::domain::content::{AnalystProfile, StockRef};
use crate::store::DashboardLookup;
use anyhow::Result;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageEntry {
    pub stock: StockRef,
    pub analysts: Vec<AnalystProfile>,
}

/// Instrument → covering analysts. Entries keep the order in which each
/// instrument was first seen; an analyst appears at most once per instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageMap {
    entries: Vec<CoverageEntry>,
    index: HashMap<StockRef, usize>,
}

impl CoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the analyst was already listed under `stock`.
    pub fn add(&mut self, stock: &StockRef, analyst: &AnalystProfile) -> bool {
        let idx = match self.index.get(stock) {
            Some(idx) => *idx,
            None => {
                self.entries.push(CoverageEntry {
                    stock: stock.clone(),
                    analysts: Vec::new(),
                });
                let idx = self.entries.len() - 1;
                self.index.insert(stock.clone(), idx);
                idx
            }
        };

        let analysts = &mut self.entries[idx].analysts;
        if analysts.iter().any(|a| a.id == analyst.id) {
            return false;
        }
        analysts.push(analyst.clone());
        true
    }

    pub fn get(&self, stock: &StockRef) -> Option<&[AnalystProfile]> {
        self.index
            .get(stock)
            .map(|idx| self.entries[*idx].analysts.as_slice())
    }

    pub fn entries(&self) -> &[CoverageEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CoverageEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// JSON object keys must be strings, so the map goes over the wire as a list.
impl Serialize for CoverageMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

/// Anything that can answer "who covers what" for a set of analysts.
#[async_trait::async_trait]
pub trait CoverageSource: Send + Sync {
    async fn coverage_for(&self, analysts: &[AnalystProfile]) -> Result<CoverageMap>;
}

/// Builds coverage by walking each analyst's dashboard.
pub struct DashboardWalk<'a, L> {
    lookup: &'a L,
}

impl<'a, L: DashboardLookup> DashboardWalk<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }
}

#[async_trait::async_trait]
impl<'a, L: DashboardLookup> CoverageSource for DashboardWalk<'a, L> {
    async fn coverage_for(&self, analysts: &[AnalystProfile]) -> Result<CoverageMap> {
        let mut map = CoverageMap::new();
        for analyst in analysts {
            let Some(dashboard) = self.lookup.find_dashboard(analyst.id).await? else {
                tracing::debug!(analyst_id = analyst.id, "no dashboard; no coverage");
                continue;
            };
            for stock in &dashboard.stocks {
                map.add(&stock.stock_ref, analyst);
            }
        }
        Ok(map)
    }
}
