//! 查询描述与结果。
//!
//! JSON 字段名使用 camelCase，与既有调用方保持一致。

use domain::ConfigurationState;
use fleet_storage::DeviceRecord;
use serde::{Deserialize, Serialize};

/// 标签集合的匹配模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TagQueryMode {
    /// 全部命中
    #[default]
    Conjunctive,
    /// 任一命中
    Disjunctive,
}

/// 设备查询描述。
///
/// 空白字符串视为未填写；未填写的字段不产生约束。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceQuery {
    /// 序列号前缀或后缀
    pub serial_number: Option<String>,
    pub iccid: Option<String>,
    pub vin: Option<String>,
    /// 心跳时间界限（Unix 毫秒）
    pub last_heartbeat_time: Option<i64>,
    /// true：早于界限；false：晚于界限
    pub before: bool,
    pub include_with_tags: Vec<String>,
    pub included_tags_mode: TagQueryMode,
    pub exclude_with_tags: Vec<String>,
    pub excluded_tags_mode: TagQueryMode,
    pub configuration_state_filter: Option<ConfigurationState>,
    pub matching_standard_configuration_title: Option<String>,
    pub matching_delta_configuration_title: Option<String>,
    pub matching_application_firmware_version: Option<String>,
    pub matching_bluetooth_firmware_version: Option<String>,
    pub matching_supervisor_firmware_version: Option<String>,
    pub order_field: Option<String>,
    pub order_by_ascending: bool,
}

impl DeviceQuery {
    /// 匹配全部设备的空查询。
    pub fn all() -> Self {
        Self::default()
    }
}

/// 分页查询描述。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceQueryPaged {
    #[serde(flatten)]
    pub query: DeviceQuery,
    /// 从 0 开始的页号
    pub desired_page: usize,
    /// 0 表示使用默认页大小
    pub page_size: usize,
    /// 仅随请求携带，租户由 TenantContext 决定
    pub customer_id: Option<String>,
}

impl DeviceQueryPaged {
    pub fn new(query: DeviceQuery, desired_page: usize, page_size: usize) -> Self {
        Self {
            query,
            desired_page,
            page_size,
            customer_id: None,
        }
    }
}

/// 单页查询结果。
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePage {
    pub items: Vec<DeviceRecord>,
    /// 实际返回的页号（请求页越界时为 0）
    pub current_page: usize,
    pub items_per_page: usize,
    pub total_count: u64,
    pub is_last_page: bool,
}

/// 全量扫描结果。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullScan {
    pub records: Vec<DeviceRecord>,
    /// 实际发出的存储请求次数（包括结束循环的空页）
    pub pages_fetched: usize,
    /// 被钩子或页数上限提前结束
    pub aborted: bool,
}
