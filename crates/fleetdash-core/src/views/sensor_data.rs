// ── Sensor data view ──
//
// Two rolling windows over the `sensor_data` stream: the table keeps the
// last `limit` readings, the chart keeps the last `chart_window` values.
// Live samples are appended regardless of the filters used for the
// initial history load.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::FleetApi;
use crate::config::ViewSettings;
use crate::error::CoreError;
use crate::model::{ChartPoint, EventName, PushEvent, SensorQuery, SensorReading};
use crate::reconcile::{Mount, Notice, NoticeSender, Reconciler, mount};
use crate::registry::EventRegistry;
use crate::store::{RollingBuffer, RollingCache};
use crate::stream::CacheStream;

struct SensorAppend {
    table: Arc<RollingCache<SensorReading>>,
    chart: Arc<RollingCache<ChartPoint>>,
}

impl Reconciler for SensorAppend {
    fn events(&self) -> Vec<EventName> {
        vec![EventName::SensorData]
    }

    fn apply(&self, event: &PushEvent) {
        if let PushEvent::SensorData(reading) = event {
            self.chart.push(reading.chart_point());
            self.table.push(reading.as_ref().clone());
        }
    }
}

pub struct SensorDataView<A: FleetApi> {
    api: Arc<A>,
    default_limit: usize,
    table: Arc<RollingCache<SensorReading>>,
    chart: Arc<RollingCache<ChartPoint>>,
    notice: NoticeSender,
    _mount: Mount,
}

impl<A: FleetApi> SensorDataView<A> {
    pub fn mount(registry: &EventRegistry, api: Arc<A>, settings: &ViewSettings) -> Self {
        let table = Arc::new(RollingCache::new(settings.sensor_table_limit));
        let chart = Arc::new(RollingCache::new(settings.chart_window));
        let mount = mount(
            registry,
            &Arc::new(SensorAppend {
                table: Arc::clone(&table),
                chart: Arc::clone(&chart),
            }),
        );
        let (notice, _) = watch::channel(None);

        Self {
            api,
            default_limit: settings.sensor_table_limit,
            table,
            chart,
            notice,
            _mount: mount,
        }
    }

    /// Seed both windows from history. The query's limit (or the
    /// configured table limit) also becomes the table's capacity.
    pub async fn load(&self, mut query: SensorQuery) -> Result<usize, CoreError> {
        let limit = query
            .limit
            .map_or(self.default_limit, |l| usize::try_from(l).unwrap_or(usize::MAX))
            .max(1);
        if query.limit.is_none() {
            query.limit = u32::try_from(limit).ok();
        }

        match self.api.sensor_history(&query).await {
            Ok(mut history) => {
                // The backend returns newest first.
                history.reverse();
                let count = history.len();
                self.chart.reset(history.iter().map(SensorReading::chart_point));
                self.table.reset_with_capacity(limit, history);
                self.notice.send_if_modified(|n| n.take().is_some());
                debug!(count, limit, "sensor history loaded");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "sensor history load failed");
                self.notice
                    .send_replace(Some(Notice::new(format!("Failed to load sensor data: {e}"))));
                Err(e)
            }
        }
    }

    /// Table rows, newest first.
    pub fn table_rows(&self) -> Vec<SensorReading> {
        self.table.snapshot().iter_newest().cloned().collect()
    }

    /// Chart series, oldest first.
    pub fn chart_points(&self) -> Vec<ChartPoint> {
        self.chart.snapshot().to_vec()
    }

    pub fn table_stream(&self) -> CacheStream<Arc<RollingBuffer<SensorReading>>> {
        CacheStream::new(self.table.subscribe())
    }

    pub fn chart_stream(&self) -> CacheStream<Arc<RollingBuffer<ChartPoint>>> {
        CacheStream::new(self.chart.subscribe())
    }

    pub fn table_limit(&self) -> usize {
        self.table.capacity()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice.borrow().clone()
    }

    pub fn notices(&self) -> CacheStream<Option<Notice>> {
        CacheStream::new(self.notice.subscribe())
    }
}
