//! 分页扫描
//!
//! - `query_page`：一页结果 + 总数；请求页越界时退回第 0 页
//! - `scan_all` / `scan_all_with`：按固定页大小从偏移 0 循环取页，
//!   直到取到空页（存储单次返回有上限）；偏移按实际返回条数推进
//! - 失败时记录 System 告警后原样返回给调用方

use crate::compiler::{CompiledQuery, PredicateCompiler};
use crate::error::QueryError;
use crate::model::{DevicePage, DeviceQuery, DeviceQueryPaged, FullScan};
use domain::TenantContext;
use fleet_config::AppConfig;
use fleet_storage::{DeviceRecord, DeviceScan, DeviceStore};
use fleet_telemetry::{
    AlertKind, raise_alert, record_page_fetched, record_query_failure, record_query_served,
    record_scan_aborted,
};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{error, info};

/// 扫描参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// 分页查询默认页大小
    pub page_size: usize,
    /// 全量扫描页大小
    pub large_page_size: usize,
    /// 全量扫描最多往返次数
    pub max_pages: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            large_page_size: 500,
            max_pages: None,
        }
    }
}

impl ScanConfig {
    pub fn new(page_size: usize, large_page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            large_page_size: large_page_size.max(1),
            max_pages: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages.filter(|value| *value > 0);
        self
    }
}

impl From<&AppConfig> for ScanConfig {
    fn from(config: &AppConfig) -> Self {
        ScanConfig::new(config.page_size, config.large_page_size)
            .with_max_pages(config.scan_max_pages)
    }
}

/// 设备扫描器
pub struct DeviceScanner {
    store: Arc<dyn DeviceStore>,
    compiler: PredicateCompiler,
    config: ScanConfig,
}

fn fail<T>(operation: &str, ctx: &TenantContext, err: QueryError) -> Result<T, QueryError> {
    record_query_failure();
    error!(target: "fleet.query", tenant_id = %ctx.tenant_id, operation, error = %err, "query_failed");
    raise_alert(AlertKind::System, &format!("{operation} failed: {err}"));
    Err(err)
}

impl DeviceScanner {
    pub fn new(store: Arc<dyn DeviceStore>, compiler: PredicateCompiler, config: ScanConfig) -> Self {
        Self {
            store,
            compiler,
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DeviceStore> {
        &self.store
    }

    /// 取一页匹配记录。
    pub async fn query_page(
        &self,
        ctx: &TenantContext,
        paged: &DeviceQueryPaged,
    ) -> Result<DevicePage, QueryError> {
        match self.query_page_inner(ctx, paged).await {
            Ok(page) => {
                record_query_served();
                info!(
                    target: "fleet.query",
                    tenant_id = %ctx.tenant_id,
                    customer_id = paged.customer_id.as_deref().unwrap_or(""),
                    page = page.current_page,
                    items = page.items.len(),
                    total = page.total_count,
                    "query_page_served"
                );
                Ok(page)
            }
            Err(err) => fail("query_page", ctx, err),
        }
    }

    async fn query_page_inner(
        &self,
        ctx: &TenantContext,
        paged: &DeviceQueryPaged,
    ) -> Result<DevicePage, QueryError> {
        let compiled = self.compiler.compile(ctx, &paged.query).await?;
        let page_size = if paged.page_size > 0 {
            paged.page_size
        } else {
            self.config.page_size
        };
        let total_count = self.store.count(ctx, &compiled.filter).await?;
        let requested_skip = page_size.saturating_mul(paged.desired_page);
        let (current_page, skip) = if (requested_skip as u64) < total_count {
            (paged.desired_page, requested_skip)
        } else {
            (0, 0)
        };
        let scan = DeviceScan::new(compiled.filter, compiled.order).page(skip, page_size);
        let items = self.store.query(ctx, &scan).await?;
        let is_last_page = (skip + items.len()) as u64 >= total_count;
        Ok(DevicePage {
            items,
            current_page,
            items_per_page: page_size,
            total_count,
            is_last_page,
        })
    }

    /// 取全部匹配记录。
    pub async fn scan_all(
        &self,
        ctx: &TenantContext,
        query: &DeviceQuery,
    ) -> Result<FullScan, QueryError> {
        self.scan_all_with(ctx, query, |_| ControlFlow::Continue(()))
            .await
    }

    /// 取全部匹配记录，每取到一页调用一次钩子；钩子返回 Break 时提前结束。
    pub async fn scan_all_with<F>(
        &self,
        ctx: &TenantContext,
        query: &DeviceQuery,
        on_page: F,
    ) -> Result<FullScan, QueryError>
    where
        F: FnMut(&[DeviceRecord]) -> ControlFlow<()> + Send,
    {
        let compiled = match self.compiler.compile(ctx, query).await {
            Ok(compiled) => compiled,
            Err(err) => return fail("scan_all", ctx, err),
        };
        match self.scan_compiled(ctx, compiled, on_page).await {
            Ok(scan) => {
                if scan.aborted {
                    record_scan_aborted();
                }
                info!(
                    target: "fleet.query",
                    tenant_id = %ctx.tenant_id,
                    records = scan.records.len(),
                    pages = scan.pages_fetched,
                    aborted = scan.aborted,
                    "full_scan_completed"
                );
                Ok(scan)
            }
            Err(err) => fail("scan_all", ctx, err),
        }
    }

    async fn scan_compiled<F>(
        &self,
        ctx: &TenantContext,
        compiled: CompiledQuery,
        mut on_page: F,
    ) -> Result<FullScan, QueryError>
    where
        F: FnMut(&[DeviceRecord]) -> ControlFlow<()> + Send,
    {
        let page_size = self.config.large_page_size;
        let mut result = FullScan::default();
        let mut offset = 0usize;
        loop {
            if self
                .config
                .max_pages
                .is_some_and(|max| result.pages_fetched >= max)
            {
                result.aborted = true;
                break;
            }
            let scan = DeviceScan::new(compiled.filter.clone(), compiled.order).page(offset, page_size);
            let page = self.store.query(ctx, &scan).await?;
            result.pages_fetched += 1;
            record_page_fetched();
            if page.is_empty() {
                break;
            }
            offset += page.len();
            let flow = on_page(&page);
            result.records.extend(page);
            if flow.is_break() {
                result.aborted = true;
                break;
            }
        }
        Ok(result)
    }

    /// 全部设备（空查询）。
    pub async fn scan_all_devices(&self, ctx: &TenantContext) -> Result<FullScan, QueryError> {
        self.scan_all(ctx, &DeviceQuery::all()).await
    }

    /// 按序列号批量查设备 id；找不到的序列号被跳过，顺序与输入一致。
    pub async fn ids_by_serials(
        &self,
        ctx: &TenantContext,
        serials: &[String],
    ) -> Result<Vec<String>, QueryError> {
        if ctx.is_blank() {
            return fail(
                "ids_by_serials",
                ctx,
                QueryError::Contract("tenant_id required".to_string()),
            );
        }
        let mut ids = Vec::with_capacity(serials.len());
        for serial in serials {
            match self.store.load_by_serial(ctx, serial).await {
                Ok(Some(record)) => ids.push(record.id),
                Ok(None) => {}
                Err(err) => return fail("ids_by_serials", ctx, err.into()),
            }
        }
        Ok(ids)
    }

    /// 统计匹配记录数。
    pub async fn count(&self, ctx: &TenantContext, query: &DeviceQuery) -> Result<u64, QueryError> {
        let result: Result<u64, QueryError> = async {
            let compiled = self.compiler.compile(ctx, query).await?;
            Ok(self.store.count(ctx, &compiled.filter).await?)
        }
        .await;
        match result {
            Ok(total) => Ok(total),
            Err(err) => fail("count", ctx, err),
        }
    }
}
