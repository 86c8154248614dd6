use futures::future::try_join_all;
use time::Date;

use crate::{
    align::align,
    bucket::{available_dates, filter_by_date, latest_date},
    config::{ProbeCatalog, ResolvedProbe},
    error::{EtError, Result},
    et,
    features::{lai_features, LaiFeatures},
    reading::{order_readings, DailyEtPoint, DerivedPoint, JoinedReading, Reading, Timestamped},
    soil::SoilType,
    store::ReadingStore,
};

/// A derived series, plus the dates present in the underlying data.
#[derive(Debug, Clone)]
pub struct DaySeries<T> {
    pub points: Vec<T>,
    pub latest_date: Option<Date>,
    pub available_dates: Vec<Date>,
}

/// A joined multi-depth series together with the ET derived from it.
#[derive(Debug, Clone)]
pub struct MultiDepthSeries {
    pub joined: Vec<JoinedReading>,
    pub et: Vec<DerivedPoint>,
    pub latest_date: Option<Date>,
    pub available_dates: Vec<Date>,
}

struct Selected<T> {
    items: Vec<T>,
    latest_date: Option<Date>,
    available_dates: Vec<Date>,
}

/// Restrict an ordered series to one day before deriving from it, so that a
/// day's first point is always `0` and never spans midnight.
fn select_day<T: Timestamped + Clone>(series: Vec<T>, day: Option<Date>) -> Selected<T> {
    let latest_date = latest_date(&series);
    let available_dates = available_dates(&series);
    let items = match day {
        Some(day) => filter_by_date(&series, day),
        None => series,
    };
    Selected {
        items,
        latest_date,
        available_dates,
    }
}

impl<T> Selected<T> {
    fn into_series<U>(self, points: Vec<U>) -> DaySeries<U> {
        DaySeries {
            points,
            latest_date: self.latest_date,
            available_dates: self.available_dates,
        }
    }
}

/// Fetches probe streams from a store and runs the derivations over them.
///
/// Holds no per-request state; every call reads the latest rows.
pub struct EtService<S> {
    store: S,
    catalog: ProbeCatalog,
}

impl<S: ReadingStore> EtService<S> {
    pub fn new(store: S, catalog: ProbeCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &ProbeCatalog {
        &self.catalog
    }

    async fn ordered(&self, probe: &ResolvedProbe) -> Result<Vec<Reading>> {
        let rows = self.store.probe_rows(&probe.table).await?;
        Ok(order_readings(rows.into_iter().map(Reading::from).collect()))
    }

    /// Ordered readings of a probe that must hold data.
    async fn fetch(&self, probe: &ResolvedProbe) -> Result<Vec<Reading>> {
        let readings = self.ordered(probe).await?;
        if readings.is_empty() {
            return Err(EtError::DataUnavailable(format!(
                "no readings for probe '{}'",
                probe.name
            )));
        }
        Ok(readings)
    }

    /// The ordered raw readings of one probe, optionally for a single day.
    pub async fn probe_series(&self, probe: &str, day: Option<Date>) -> Result<DaySeries<Reading>> {
        let probe = self.catalog.probe(probe)?;
        let selected = select_day(self.fetch(probe).await?, day);
        Ok(DaySeries {
            points: selected.items,
            latest_date: selected.latest_date,
            available_dates: selected.available_dates,
        })
    }

    /// The weight a single-probe derivation uses: the override when given,
    /// otherwise the probe's configured depth weight.
    pub fn depth_weight(&self, probe: &str, weight: Option<f64>) -> Result<f64> {
        let probe = self.catalog.probe(probe)?;
        match weight {
            None => Ok(probe.depth_weight),
            Some(w) if w.is_finite() && w > 0.0 => Ok(w),
            Some(w) => Err(EtError::InvalidParameter(format!(
                "weight must be a positive number, got {w}"
            ))),
        }
    }

    /// Single-probe ET with one point per reading.
    pub async fn probe_et(
        &self,
        probe: &str,
        day: Option<Date>,
        weight: Option<f64>,
    ) -> Result<DaySeries<DerivedPoint>> {
        let weight = self.depth_weight(probe, weight)?;
        let probe = self.catalog.probe(probe)?;
        let selected = select_day(self.fetch(probe).await?, day);
        let points = et::single_probe_et(&selected.items, weight)?;
        let gaps = et::single_probe_gaps(&selected.items);
        record_derivation("single_probe", &probe.name, points.len(), gaps);
        Ok(selected.into_series(points))
    }

    /// Single-probe ET restricted to same-day pairs.
    pub async fn probe_daily_et(
        &self,
        probe: &str,
        day: Option<Date>,
        weight: Option<f64>,
    ) -> Result<DaySeries<DailyEtPoint>> {
        let weight = self.depth_weight(probe, weight)?;
        let probe = self.catalog.probe(probe)?;
        let selected = select_day(self.fetch(probe).await?, day);
        let points = et::same_day_et(&selected.items, weight)?;
        let gaps = et::single_probe_gaps(&selected.items);
        record_derivation("same_day", &probe.name, points.len(), gaps);
        Ok(selected.into_series(points))
    }

    /// Only the base stream must hold data; an empty deeper probe joins as an
    /// all-null column.
    async fn joined(&self) -> Result<Vec<JoinedReading>> {
        let probes: Vec<&ResolvedProbe> = self.catalog.multi_depth_probes().collect();
        let (base, others) = probes
            .split_first()
            .ok_or_else(|| EtError::Configuration("no multi-depth probes configured".to_string()))?;

        let (base, others) = futures::try_join!(
            self.fetch(base),
            try_join_all(others.iter().map(|p| self.ordered(p)))
        )?;
        let others: Vec<&[Reading]> = others.iter().map(Vec::as_slice).collect();
        Ok(align(&base, &others))
    }

    /// Depth-weighted, soil-corrected ET over the multi-depth join.
    pub async fn multi_depth_et(&self, soil: SoilType, day: Option<Date>) -> Result<MultiDepthSeries> {
        let selected = select_day(self.joined().await?, day);
        let et = et::weighted_multi_depth_et(&selected.items, &self.catalog.weights, soil)?;
        record_derivation("weighted", soil.name(), et.len(), et::joined_gaps(&selected.items));
        Ok(MultiDepthSeries {
            joined: selected.items,
            et,
            latest_date: selected.latest_date,
            available_dates: selected.available_dates,
        })
    }

    /// Uniform-weight ET over the multi-depth join, without soil correction.
    pub async fn uniform_multi_depth_et(&self, day: Option<Date>) -> Result<MultiDepthSeries> {
        let selected = select_day(self.joined().await?, day);
        let et = et::uniform_multi_depth_et(&selected.items, self.catalog.uniform_weight)?;
        record_derivation("uniform", "-", et.len(), et::joined_gaps(&selected.items));
        Ok(MultiDepthSeries {
            joined: selected.items,
            et,
            latest_date: selected.latest_date,
            available_dates: selected.available_dates,
        })
    }

    /// Regression inputs for one probe.
    pub async fn lai_features(&self, probe: &str, day: Option<Date>) -> Result<DaySeries<LaiFeatures>> {
        let probe = self.catalog.probe(probe)?;
        let selected = select_day(self.fetch(probe).await?, day);
        let points = lai_features(&selected.items);
        Ok(selected.into_series(points))
    }
}

fn record_derivation(variant: &'static str, subject: &str, points: usize, gaps: usize) {
    metrics::counter!("et_series_derived_total", "variant" => variant).increment(1);
    metrics::counter!("et_gap_points_total", "variant" => variant).increment(gaps as u64);
    tracing::info!(variant, subject, points, gaps, "et series derived");
}
