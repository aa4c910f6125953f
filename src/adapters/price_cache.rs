//! In-memory TTL cache in front of a data source.
//!
//! `CachedPriceSource` wraps any [`PricePort`] (and, when the inner source
//! also provides one, its [`IndexPort`]). Prices are cached per symbol: the
//! first request loads the symbol's whole history up to today (or the
//! requested end, if later) and every later window or point lookup is cut
//! from that copy. Failures are never cached. Entries expire after the
//! configured TTL and are evicted when next touched; `invalidate` and
//! `invalidate_all` drop entries on demand. A pass-through instance forwards
//! every request and stores nothing.

use crate::domain::error::TrendpickError;
use crate::domain::price::{lookup_price, DailyPrice};
use crate::domain::universe::{ConstituentChange, StockIndex};
use crate::ports::index_port::IndexPort;
use crate::ports::price_port::PricePort;
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Same-day reuse.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    stored_at: Instant,
}

impl<T: Clone> CacheEntry<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            stored_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() > ttl
    }
}

/// Full price history of one symbol, oldest first, complete through `loaded_to`.
#[derive(Debug)]
struct SymbolSeries {
    loaded_to: NaiveDate,
    prices: Vec<DailyPrice>,
}

impl SymbolSeries {
    fn window(&self, from_date: NaiveDate, to_date: NaiveDate) -> Vec<DailyPrice> {
        let start = self.prices.partition_point(|p| p.date < from_date);
        let end = self.prices.partition_point(|p| p.date <= to_date);
        if start >= end {
            return Vec::new();
        }
        self.prices[start..end].to_vec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub series_entries: usize,
    pub constituent_entries: usize,
}

struct Table<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K: Eq + Hash, V: Clone> Table<K, V> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh value for `key`. An expired entry is removed.
    fn get(&self, key: &K, ttl: Duration) -> Option<V> {
        {
            let map = self.entries.read().ok()?;
            match map.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(ttl) => return Some(entry.data.clone()),
                Some(_) => {}
            }
        }
        if let Ok(mut map) = self.entries.write() {
            if map.get(key).is_some_and(|entry| entry.is_expired(ttl)) {
                map.remove(key);
            }
        }
        None
    }

    fn put(&self, key: K, value: V) {
        if let Ok(mut map) = self.entries.write() {
            map.insert(key, CacheEntry::new(value));
        }
    }

    fn retain<F: Fn(&K) -> bool>(&self, keep: F) {
        if let Ok(mut map) = self.entries.write() {
            map.retain(|k, _| keep(k));
        }
    }

    fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Answer from the cache, or ask `load` and remember a success.
    fn get_or_load<F>(&self, key: K, ttl: Option<Duration>, load: F) -> Result<V, TrendpickError>
    where
        F: FnOnce() -> Result<V, TrendpickError>,
    {
        let Some(ttl) = ttl else {
            return load();
        };
        if let Some(hit) = self.get(&key, ttl) {
            return Ok(hit);
        }
        let value = load()?;
        self.put(key, value.clone());
        Ok(value)
    }
}

pub struct CachedPriceSource<P> {
    inner: P,
    ttl: Option<Duration>,
    series: Table<String, Arc<SymbolSeries>>,
    constituents: Table<StockIndex, Vec<ConstituentChange>>,
}

impl<P> CachedPriceSource<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self::build(inner, Some(ttl))
    }

    pub fn with_default_ttl(inner: P) -> Self {
        Self::new(inner, DEFAULT_TTL)
    }

    pub fn passthrough(inner: P) -> Self {
        Self::build(inner, None)
    }

    fn build(inner: P, ttl: Option<Duration>) -> Self {
        Self {
            inner,
            ttl,
            series: Table::new(),
            constituents: Table::new(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Drop the cached history of `symbol`.
    pub fn invalidate(&self, symbol: &str) {
        self.series.retain(|s| s != symbol);
    }

    pub fn invalidate_all(&self) {
        self.series.retain(|_| false);
        self.constituents.retain(|_| false);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            series_entries: self.series.len(),
            constituent_entries: self.constituents.len(),
        }
    }
}

impl<P: PricePort> CachedPriceSource<P> {
    /// Cached history of `symbol` covering at least `through`.
    fn history(&self, symbol: &str, through: NaiveDate, ttl: Duration) -> Result<Arc<SymbolSeries>, TrendpickError> {
        let key = symbol.to_string();
        if let Some(hit) = self.series.get(&key, ttl) {
            if hit.loaded_to >= through {
                return Ok(hit);
            }
        }

        let loaded_to = through.max(Local::now().date_naive());
        let mut prices = self.inner.price_series(symbol, NaiveDate::MIN, loaded_to)?;
        prices.sort_by_key(|p| p.date);

        let entry = Arc::new(SymbolSeries { loaded_to, prices });
        self.series.put(key, Arc::clone(&entry));
        Ok(entry)
    }
}

impl<P: PricePort> PricePort for CachedPriceSource<P> {
    fn price_series(
        &self,
        symbol: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<DailyPrice>, TrendpickError> {
        let Some(ttl) = self.ttl else {
            return self.inner.price_series(symbol, from_date, to_date);
        };
        Ok(self.history(symbol, to_date, ttl)?.window(from_date, to_date))
    }

    fn price_at(
        &self,
        symbol: &str,
        date: NaiveDate,
        nearest_backward: bool,
    ) -> Result<DailyPrice, TrendpickError> {
        let Some(ttl) = self.ttl else {
            return self.inner.price_at(symbol, date, nearest_backward);
        };
        let history = self.history(symbol, date, ttl)?;
        lookup_price(&history.prices, date, nearest_backward)
            .cloned()
            .ok_or_else(|| TrendpickError::PriceNotFound {
                symbol: symbol.to_string(),
                date,
            })
    }
}

impl<P: IndexPort> IndexPort for CachedPriceSource<P> {
    fn constituent_changes(&self, index: StockIndex) -> Result<Vec<ConstituentChange>, TrendpickError> {
        self.constituents
            .get_or_load(index, self.ttl, || self.inner.constituent_changes(index))
    }
}
