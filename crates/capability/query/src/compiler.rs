//! 谓词编译
//!
//! 按字段顺序把已填写的条件逐个 AND 进过滤器：
//!
//! - 序列号 / ICCID / VIN：存储值以给定串开头或结尾
//! - 心跳时间：`before` 为真时严格早于界限，否则严格晚于
//! - 包含标签：小写用户标签按模式（全部 / 任一）匹配标签集；
//!   大写能力标签总是“任一”匹配能力集；两者同时存在时取 AND
//! - 排除标签：Disjunctive 要求不含任何排除标签；
//!   Conjunctive 分支检查的是**包含**标签列表（任一命中即匹配），
//!   这是既有行为，调用方依赖它，不在这里修正
//! - 标准配置标题：标题解析到配置时按其哈希过滤，解析不到则不加约束
//! - 增量配置标题：按同名全部配置的哈希集合过滤，集合为空时不匹配任何记录
//! - 固件版本：字符串相等
//! - 排序：字段名不区分大小写；未知字段退回默认顺序

use crate::error::QueryError;
use crate::model::{DeviceQuery, TagQueryMode};
use domain::{TenantContext, split_tags};
use fleet_lookup::ConfigLookup;
use fleet_storage::{
    Constraint, DeviceFilter, DeviceOrder, FirmwareField, HashField, SortField, TextField,
};
use std::sync::Arc;
use tracing::debug;

/// 编译结果：过滤器 + 可选排序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    pub filter: DeviceFilter,
    pub order: Option<DeviceOrder>,
}

/// 谓词编译器
///
/// 配置标题过滤需要查询配置目录，因此编译是异步的。
#[derive(Clone)]
pub struct PredicateCompiler {
    configs: Arc<dyn ConfigLookup>,
}

fn filled(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|value| !value.trim().is_empty())
}

fn non_blank(tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter(|tag| !tag.trim().is_empty())
        .cloned()
        .collect()
}

impl PredicateCompiler {
    pub fn new(configs: Arc<dyn ConfigLookup>) -> Self {
        Self { configs }
    }

    pub async fn compile(
        &self,
        ctx: &TenantContext,
        query: &DeviceQuery,
    ) -> Result<CompiledQuery, QueryError> {
        if ctx.is_blank() {
            return Err(QueryError::Contract("tenant_id required".to_string()));
        }
        let mut filter = DeviceFilter::all();

        for (field, value) in [
            (TextField::SerialNumber, &query.serial_number),
            (TextField::Iccid, &query.iccid),
            (TextField::Vin, &query.vin),
        ] {
            if let Some(needle) = filled(value) {
                filter.and(Constraint::PrefixOrSuffix {
                    field,
                    needle: needle.to_string(),
                });
            }
        }

        if let Some(bound) = query.last_heartbeat_time {
            if query.before {
                filter.and(Constraint::ContactBefore(bound));
            } else {
                filter.and(Constraint::ContactAfter(bound));
            }
        }

        let include = non_blank(&query.include_with_tags);
        if !include.is_empty() {
            let (user_tags, capability_tags) = split_tags(&include);
            if !user_tags.is_empty() {
                match query.included_tags_mode {
                    TagQueryMode::Conjunctive => filter.and(Constraint::HasAllTags(user_tags)),
                    TagQueryMode::Disjunctive => filter.and(Constraint::HasAnyTag(user_tags)),
                }
            }
            if !capability_tags.is_empty() {
                filter.and(Constraint::HasAnyCapability(capability_tags));
            }
        }

        let exclude = non_blank(&query.exclude_with_tags);
        if !exclude.is_empty() {
            match query.excluded_tags_mode {
                TagQueryMode::Conjunctive => filter.and(Constraint::HasAnyTag(include.clone())),
                TagQueryMode::Disjunctive => filter.and(Constraint::HasNoTag(exclude)),
            }
        }

        if let Some(state) = query.configuration_state_filter {
            filter.and(Constraint::StateIs(state));
        }

        if let Some(title) = filled(&query.matching_standard_configuration_title) {
            match self.configs.find_by_title(ctx, title).await? {
                Some(meta) => filter.and(Constraint::HashIn {
                    field: HashField::Standard,
                    hashes: vec![meta.hash],
                }),
                None => {
                    debug!(target: "fleet.query", tenant_id = %ctx.tenant_id, title, "standard_title_unresolved");
                }
            }
        }

        if let Some(title) = filled(&query.matching_delta_configuration_title) {
            let hashes = self
                .configs
                .find_all_by_title(ctx, title)
                .await?
                .into_iter()
                .map(|meta| meta.hash)
                .collect();
            filter.and(Constraint::HashIn {
                field: HashField::Delta,
                hashes,
            });
        }

        for (field, value) in [
            (FirmwareField::Application, &query.matching_application_firmware_version),
            (FirmwareField::Bluetooth, &query.matching_bluetooth_firmware_version),
            (FirmwareField::Supervisor, &query.matching_supervisor_firmware_version),
        ] {
            if let Some(version) = filled(value) {
                filter.and(Constraint::FirmwareIs {
                    field,
                    version: version.to_string(),
                });
            }
        }

        Ok(CompiledQuery {
            filter,
            order: compile_order(query),
        })
    }
}

/// 解析排序字段；未填写或未知字段返回 None。
pub fn compile_order(query: &DeviceQuery) -> Option<DeviceOrder> {
    let name = filled(&query.order_field)?;
    let Some(field) = SortField::parse(name.trim()) else {
        debug!(target: "fleet.query", order_field = name, "order_field_unknown");
        return None;
    };
    Some(if query.order_by_ascending {
        DeviceOrder::asc(field)
    } else {
        DeviceOrder::desc(field)
    })
}
