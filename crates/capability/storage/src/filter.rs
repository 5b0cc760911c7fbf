//! 设备过滤条件 AST
//!
//! 查询编译器产出 `DeviceFilter`（约束的合取）与可选的 `DeviceOrder`，
//! 各存储实现负责执行：
//! - 内存实现直接调用 `Constraint::matches`
//! - PostgreSQL 实现把约束渲染为 JSONB 条件
//!
//! 空过滤器匹配全部记录。

use crate::models::DeviceRecord;
use domain::ConfigurationState;
use std::cmp::Ordering;

/// 支持前缀/后缀匹配的文本字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    SerialNumber,
    Iccid,
    Vin,
}

impl TextField {
    pub fn document_key(&self) -> &'static str {
        match self {
            TextField::SerialNumber => "serial_number",
            TextField::Iccid => "iccid",
            TextField::Vin => "vin",
        }
    }

    fn value<'a>(&self, record: &'a DeviceRecord) -> Option<&'a str> {
        match self {
            TextField::SerialNumber => record.serial_number.as_deref(),
            TextField::Iccid => record.iccid.as_deref(),
            TextField::Vin => record.vin.as_deref(),
        }
    }
}

/// 上报的配置哈希字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashField {
    Standard,
    Delta,
}

impl HashField {
    pub fn document_key(&self) -> &'static str {
        match self {
            HashField::Standard => "last_reported_standard_configuration_hash",
            HashField::Delta => "last_reported_delta_configuration_hash",
        }
    }

    fn value<'a>(&self, record: &'a DeviceRecord) -> Option<&'a str> {
        match self {
            HashField::Standard => record.last_reported_standard_configuration_hash.as_deref(),
            HashField::Delta => record.last_reported_delta_configuration_hash.as_deref(),
        }
    }
}

/// 上报的固件版本字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareField {
    Application,
    Bluetooth,
    Supervisor,
}

impl FirmwareField {
    pub fn document_key(&self) -> &'static str {
        match self {
            FirmwareField::Application => "application_firmware_version",
            FirmwareField::Bluetooth => "bluetooth_firmware_version",
            FirmwareField::Supervisor => "supervisor_firmware_version",
        }
    }

    fn value<'a>(&self, record: &'a DeviceRecord) -> Option<&'a str> {
        match self {
            FirmwareField::Application => record.application_firmware_version.as_deref(),
            FirmwareField::Bluetooth => record.bluetooth_firmware_version.as_deref(),
            FirmwareField::Supervisor => record.supervisor_firmware_version.as_deref(),
        }
    }
}

/// 单个约束。
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// 存储值以 needle 开头或结尾；存储值缺失时不匹配
    PrefixOrSuffix { field: TextField, needle: String },
    /// 最近心跳严格早于给定时间；从未联系过的设备视为最早
    ContactBefore(i64),
    /// 最近心跳严格晚于给定时间
    ContactAfter(i64),
    /// 标签集包含全部给定标签
    HasAllTags(Vec<String>),
    /// 标签集至少包含一个给定标签（列表为空时不匹配）
    HasAnyTag(Vec<String>),
    /// 标签集不包含任何给定标签
    HasNoTag(Vec<String>),
    /// 能力集至少包含一个给定能力
    HasAnyCapability(Vec<String>),
    StateIs(ConfigurationState),
    /// 哈希等于列表中任意一项（列表为空时不匹配）
    HashIn { field: HashField, hashes: Vec<String> },
    FirmwareIs { field: FirmwareField, version: String },
}

impl Constraint {
    pub fn matches(&self, record: &DeviceRecord) -> bool {
        match self {
            Constraint::PrefixOrSuffix { field, needle } => field
                .value(record)
                .is_some_and(|value| value.starts_with(needle.as_str()) || value.ends_with(needle.as_str())),
            Constraint::ContactBefore(bound) => record.last_contact_ms.is_none_or(|ts| ts < *bound),
            Constraint::ContactAfter(bound) => record.last_contact_ms.is_some_and(|ts| ts > *bound),
            Constraint::HasAllTags(tags) => tags.iter().all(|tag| record.has_tag(tag)),
            Constraint::HasAnyTag(tags) => tags.iter().any(|tag| record.has_tag(tag)),
            Constraint::HasNoTag(tags) => !tags.iter().any(|tag| record.has_tag(tag)),
            Constraint::HasAnyCapability(caps) => caps.iter().any(|cap| record.has_capability(cap)),
            Constraint::StateIs(state) => record.state == *state,
            Constraint::HashIn { field, hashes } => field
                .value(record)
                .is_some_and(|value| hashes.iter().any(|hash| hash == value)),
            Constraint::FirmwareIs { field, version } => field.value(record) == Some(version.as_str()),
        }
    }
}

/// 约束的合取。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceFilter {
    constraints: Vec<Constraint>,
}

impl DeviceFilter {
    /// 匹配全部记录的过滤器。
    pub fn all() -> Self {
        Self::default()
    }

    pub fn and(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.and(constraint);
        self
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn matches(&self, record: &DeviceRecord) -> bool {
        self.constraints.iter().all(|constraint| constraint.matches(record))
    }
}

/// 可排序字段（替代按属性名反射排序）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    SerialNumber,
    LastContact,
    Iccid,
    Vin,
    Imei,
    PingCount,
    RecentPingsCount,
    State,
    DeviceModel,
    StandardConfigurationTitle,
    DeltaConfigurationTitle,
    ApplicationFirmwareVersion,
    BluetoothFirmwareVersion,
    SupervisorFirmwareVersion,
    Rssi,
    ExternalVoltage,
    BatteryVoltage,
}

impl SortField {
    pub const ALL: [SortField; 17] = [
        SortField::SerialNumber,
        SortField::LastContact,
        SortField::Iccid,
        SortField::Vin,
        SortField::Imei,
        SortField::PingCount,
        SortField::RecentPingsCount,
        SortField::State,
        SortField::DeviceModel,
        SortField::StandardConfigurationTitle,
        SortField::DeltaConfigurationTitle,
        SortField::ApplicationFirmwareVersion,
        SortField::BluetoothFirmwareVersion,
        SortField::SupervisorFirmwareVersion,
        SortField::Rssi,
        SortField::ExternalVoltage,
        SortField::BatteryVoltage,
    ];

    /// 按名称解析，忽略大小写和下划线（`LastContact` 与 `last_contact` 等价）。
    /// 未知字段返回 None，调用方退回默认顺序。
    pub fn parse(name: &str) -> Option<SortField> {
        let wanted = fold_name(name);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|field| fold_name(field.name()) == wanted)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SortField::SerialNumber => "SerialNumber",
            SortField::LastContact => "LastContact",
            SortField::Iccid => "ICCID",
            SortField::Vin => "VIN",
            SortField::Imei => "IMEI",
            SortField::PingCount => "PingCount",
            SortField::RecentPingsCount => "RecentPingsCount",
            SortField::State => "State",
            SortField::DeviceModel => "DeviceModel",
            SortField::StandardConfigurationTitle => "StandardConfigurationTitle",
            SortField::DeltaConfigurationTitle => "DeltaConfigurationTitle",
            SortField::ApplicationFirmwareVersion => "ApplicationFirmwareVersion",
            SortField::BluetoothFirmwareVersion => "BluetoothFirmwareVersion",
            SortField::SupervisorFirmwareVersion => "SupervisorFirmwareVersion",
            SortField::Rssi => "RSSI",
            SortField::ExternalVoltage => "ExternalVoltage",
            SortField::BatteryVoltage => "BatteryVoltage",
        }
    }

    /// 文档中的键名。
    pub fn document_key(&self) -> &'static str {
        match self {
            SortField::SerialNumber => "serial_number",
            SortField::LastContact => "last_contact_ms",
            SortField::Iccid => "iccid",
            SortField::Vin => "vin",
            SortField::Imei => "imei",
            SortField::PingCount => "ping_count",
            SortField::RecentPingsCount => "recent_pings_count",
            SortField::State => "state",
            SortField::DeviceModel => "device_model",
            SortField::StandardConfigurationTitle => "standard_configuration_title",
            SortField::DeltaConfigurationTitle => "delta_configuration_title",
            SortField::ApplicationFirmwareVersion => "application_firmware_version",
            SortField::BluetoothFirmwareVersion => "bluetooth_firmware_version",
            SortField::SupervisorFirmwareVersion => "supervisor_firmware_version",
            SortField::Rssi => "rssi",
            SortField::ExternalVoltage => "external_voltage",
            SortField::BatteryVoltage => "battery_voltage",
        }
    }

    /// 数值字段按整数比较，其余按字符串比较。
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SortField::LastContact
                | SortField::PingCount
                | SortField::RecentPingsCount
                | SortField::State
                | SortField::Rssi
                | SortField::ExternalVoltage
                | SortField::BatteryVoltage
        )
    }

    /// 记录上的排序键。
    pub fn key<'a>(&self, record: &'a DeviceRecord) -> SortKey<'a> {
        match self {
            SortField::SerialNumber => SortKey::Text(record.serial_number.as_deref()),
            SortField::LastContact => SortKey::Int(record.last_contact_ms),
            SortField::Iccid => SortKey::Text(record.iccid.as_deref()),
            SortField::Vin => SortKey::Text(record.vin.as_deref()),
            SortField::Imei => SortKey::Text(record.imei.as_deref()),
            SortField::PingCount => SortKey::Int(Some(record.ping_count)),
            SortField::RecentPingsCount => SortKey::Int(Some(record.recent_pings_count as i64)),
            SortField::State => SortKey::Int(Some(record.state as i64)),
            SortField::DeviceModel => SortKey::Text(record.device_model.as_deref()),
            SortField::StandardConfigurationTitle => {
                SortKey::Text(record.standard_configuration_title.as_deref())
            }
            SortField::DeltaConfigurationTitle => {
                SortKey::Text(record.delta_configuration_title.as_deref())
            }
            SortField::ApplicationFirmwareVersion => {
                SortKey::Text(record.application_firmware_version.as_deref())
            }
            SortField::BluetoothFirmwareVersion => {
                SortKey::Text(record.bluetooth_firmware_version.as_deref())
            }
            SortField::SupervisorFirmwareVersion => {
                SortKey::Text(record.supervisor_firmware_version.as_deref())
            }
            SortField::Rssi => SortKey::Int(Some(record.rssi as i64)),
            SortField::ExternalVoltage => SortKey::Int(Some(record.external_voltage as i64)),
            SortField::BatteryVoltage => SortKey::Int(Some(record.battery_voltage as i64)),
        }
    }
}

fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|ch| *ch != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// 排序键：None 排在 Some 之前（升序）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey<'a> {
    Text(Option<&'a str>),
    Int(Option<i64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl DeviceOrder {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// 比较两条记录：先按排序键（可选），再按 id 升序，保证跨页稳定。
pub fn compare_records(a: &DeviceRecord, b: &DeviceRecord, order: Option<&DeviceOrder>) -> Ordering {
    let by_key = match order {
        Some(order) => {
            let ordering = order.field.key(a).cmp(&order.field.key(b));
            match order.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
        None => Ordering::Equal,
    };
    by_key.then_with(|| a.id.cmp(&b.id))
}

/// 一次存储查询：过滤 + 排序 + 偏移/条数。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceScan {
    pub filter: DeviceFilter,
    pub order: Option<DeviceOrder>,
    pub skip: usize,
    pub limit: usize,
}

impl DeviceScan {
    pub fn new(filter: DeviceFilter, order: Option<DeviceOrder>) -> Self {
        Self {
            filter,
            order,
            skip: 0,
            limit: 0,
        }
    }

    pub fn page(mut self, skip: usize, limit: usize) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }
}
