//! Postgres 设备存储实现
//!
//! 每台设备一行：`device_documents(tenant_id, device_id, serial_number, doc jsonb)`。
//! 整条记录以 JSONB 文档保存，过滤 AST 渲染为 JSONB 条件。
//!
//! 设计要点：
//! - 所有查询都带 tenant_id 条件
//! - 使用 QueryBuilder 参数化绑定，字段名只来自静态映射
//! - 排序：排序键 + device_id，与内存实现一致（升序时空值在前）

use crate::error::StorageError;
use crate::filter::{Constraint, DeviceFilter, DeviceOrder, DeviceScan, SortDirection, SortField};
use crate::models::{DeviceRecord, IndexField};
use crate::traits::DeviceStore;
use crate::validation::{ensure_record_tenant, ensure_tenant};
use domain::{ConfigurationState, TenantContext};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;

pub struct PgDeviceStore {
    pub pool: PgPool,
}

impl PgDeviceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }

    /// 建表（幂等）。
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "create table if not exists device_documents ( \
             tenant_id text not null, \
             device_id text not null, \
             serial_number text, \
             doc jsonb not null, \
             primary key (tenant_id, device_id))",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "create index if not exists idx_device_documents_serial \
             on device_documents (tenant_id, serial_number)",
        )
        .execute(&self.pool)
        .await?;
        debug!(target: "fleet.storage", "device_schema_ready");
        Ok(())
    }
}

fn decode_doc(raw: &str) -> Result<DeviceRecord, StorageError> {
    Ok(serde_json::from_str(raw)?)
}

fn decode_rows(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<DeviceRecord>, StorageError> {
    let mut devices = Vec::with_capacity(rows.len());
    for row in rows {
        let raw: String = row.try_get("doc")?;
        devices.push(decode_doc(&raw)?);
    }
    Ok(devices)
}

/// 文本字段表达式
fn text_expr(key: &str) -> String {
    format!("(doc->>'{key}')")
}

/// 整数字段表达式
fn int_expr(key: &str) -> String {
    format!("((doc->>'{key}')::bigint)")
}

fn state_names() -> Vec<String> {
    ConfigurationState::ALL
        .iter()
        .map(|state| state.as_str().to_string())
        .collect()
}

fn push_constraint(builder: &mut QueryBuilder<'_, Postgres>, constraint: &Constraint) {
    match constraint {
        Constraint::PrefixOrSuffix { field, needle } => {
            let expr = text_expr(field.document_key());
            builder.push(format!("(left({expr}, char_length("));
            builder.push_bind(needle.clone());
            builder.push(")) = ");
            builder.push_bind(needle.clone());
            builder.push(format!(" or right({expr}, char_length("));
            builder.push_bind(needle.clone());
            builder.push(")) = ");
            builder.push_bind(needle.clone());
            builder.push(")");
        }
        Constraint::ContactBefore(bound) => {
            builder.push("((doc->>'last_contact_ms') is null or ");
            builder.push(int_expr("last_contact_ms"));
            builder.push(" < ");
            builder.push_bind(*bound);
            builder.push(")");
        }
        Constraint::ContactAfter(bound) => {
            builder.push(int_expr("last_contact_ms"));
            builder.push(" > ");
            builder.push_bind(*bound);
        }
        Constraint::HasAllTags(tags) => {
            builder.push("(doc->'tags') ?& ");
            builder.push_bind(tags.clone());
        }
        Constraint::HasAnyTag(tags) => {
            builder.push("(doc->'tags') ?| ");
            builder.push_bind(tags.clone());
        }
        Constraint::HasNoTag(tags) => {
            builder.push("not ((doc->'tags') ?| ");
            builder.push_bind(tags.clone());
            builder.push(")");
        }
        Constraint::HasAnyCapability(caps) => {
            builder.push("(doc->'capabilities') ?| ");
            builder.push_bind(caps.clone());
        }
        Constraint::StateIs(state) => {
            builder.push("(doc->>'state') = ");
            builder.push_bind(state.as_str());
        }
        Constraint::HashIn { field, hashes } => {
            builder.push(text_expr(field.document_key()));
            builder.push(" = any(");
            builder.push_bind(hashes.clone());
            builder.push(")");
        }
        Constraint::FirmwareIs { field, version } => {
            builder.push(text_expr(field.document_key()));
            builder.push(" = ");
            builder.push_bind(version.clone());
        }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &DeviceFilter) {
    for constraint in filter.constraints() {
        builder.push(" and ");
        push_constraint(builder, constraint);
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Postgres>, order: Option<&DeviceOrder>) {
    builder.push(" order by ");
    if let Some(order) = order {
        match order.field {
            SortField::State => {
                // 按枚举声明顺序，而不是字符串顺序
                builder.push("array_position(");
                builder.push_bind(state_names());
                builder.push("::text[], (doc->>'state'))");
            }
            field if field.is_numeric() => {
                builder.push(int_expr(field.document_key()));
            }
            field => {
                builder.push(text_expr(field.document_key()));
            }
        }
        match order.direction {
            SortDirection::Asc => builder.push(" asc nulls first, "),
            SortDirection::Desc => builder.push(" desc nulls last, "),
        };
    }
    builder.push("device_id asc");
}

#[async_trait::async_trait]
impl DeviceStore for PgDeviceStore {
    async fn load_by_id(
        &self,
        ctx: &TenantContext,
        id: &str,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        ensure_tenant(ctx)?;
        let row = sqlx::query(
            "select doc::text as doc from device_documents \
             where tenant_id = $1 and device_id = $2",
        )
        .bind(&ctx.tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("doc")?;
        Ok(Some(decode_doc(&raw)?))
    }

    async fn load_by_serial(
        &self,
        ctx: &TenantContext,
        serial_number: &str,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        ensure_tenant(ctx)?;
        let row = sqlx::query(
            "select doc::text as doc from device_documents \
             where tenant_id = $1 and serial_number = $2 \
             order by device_id limit 1",
        )
        .bind(&ctx.tenant_id)
        .bind(serial_number)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("doc")?;
        Ok(Some(decode_doc(&raw)?))
    }

    async fn load_many(
        &self,
        ctx: &TenantContext,
        ids: &[String],
    ) -> Result<Vec<DeviceRecord>, StorageError> {
        ensure_tenant(ctx)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "select doc::text as doc from device_documents \
             where tenant_id = $1 and device_id = any($2) order by device_id",
        )
        .bind(&ctx.tenant_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        decode_rows(rows)
    }

    async fn count(&self, ctx: &TenantContext, filter: &DeviceFilter) -> Result<u64, StorageError> {
        ensure_tenant(ctx)?;
        let mut builder =
            QueryBuilder::<Postgres>::new("select count(*) as total from device_documents where tenant_id = ");
        builder.push_bind(ctx.tenant_id.clone());
        push_filter(&mut builder, filter);
        let row = builder.build().fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }

    async fn query(
        &self,
        ctx: &TenantContext,
        scan: &DeviceScan,
    ) -> Result<Vec<DeviceRecord>, StorageError> {
        ensure_tenant(ctx)?;
        let mut builder =
            QueryBuilder::<Postgres>::new("select doc::text as doc from device_documents where tenant_id = ");
        builder.push_bind(ctx.tenant_id.clone());
        push_filter(&mut builder, &scan.filter);
        push_order(&mut builder, scan.order.as_ref());
        if scan.limit > 0 {
            builder.push(" limit ");
            builder.push_bind(scan.limit as i64);
        }
        if scan.skip > 0 {
            builder.push(" offset ");
            builder.push_bind(scan.skip as i64);
        }
        let rows = builder.build().fetch_all(&self.pool).await?;
        decode_rows(rows)
    }

    async fn upsert(&self, ctx: &TenantContext, record: &DeviceRecord) -> Result<(), StorageError> {
        ensure_record_tenant(ctx, record)?;
        let doc = serde_json::to_string(record)?;
        sqlx::query(
            "insert into device_documents (tenant_id, device_id, serial_number, doc) \
             values ($1, $2, $3, $4::jsonb) \
             on conflict (tenant_id, device_id) do update set \
             serial_number = excluded.serial_number, doc = excluded.doc",
        )
        .bind(&record.tenant_id)
        .bind(&record.id)
        .bind(&record.serial_number)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, ctx: &TenantContext, id: &str) -> Result<bool, StorageError> {
        ensure_tenant(ctx)?;
        let result =
            sqlx::query("delete from device_documents where tenant_id = $1 and device_id = $2")
                .bind(&ctx.tenant_id)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ensure_indexes(&self, fields: &[IndexField]) -> Result<(), StorageError> {
        for field in fields {
            let key = field.document_key();
            let sql = if field.is_array() {
                format!(
                    "create index if not exists idx_device_documents_{key} \
                     on device_documents using gin ((doc->'{key}'))"
                )
            } else {
                format!(
                    "create index if not exists idx_device_documents_{key} \
                     on device_documents (tenant_id, (doc->>'{key}'))"
                )
            };
            sqlx::query(&sql).execute(&self.pool).await?;
            debug!(target: "fleet.storage", index = key, "device_index_ensured");
        }
        Ok(())
    }
}
