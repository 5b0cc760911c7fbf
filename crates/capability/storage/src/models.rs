//! 数据模型
//!
//! - DeviceRecord：每台物理设备一条文档，按 `id` 唯一，按序列号建索引
//! - IndexField：存储层需要建立索引的字段
//!
//! 文档是扁平的键值结构；新增字段向后兼容（缺失时取默认值）。

use domain::{BleState, CommunicationMethod, ConfigurationState, GeoLocation, SatSignal};
use serde::{Deserialize, Serialize};

/// 设备记录。
///
/// 字段分三组：身份与新鲜度、上报遥测、配置/固件关联。
/// 除 `id` 与 `tenant_id` 外，所有字段只通过心跳合并或标签服务修改。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceRecord {
    pub id: String,
    pub tenant_id: String,

    // 身份与新鲜度
    pub serial_number: Option<String>,
    /// 最近一次心跳时间（Unix 毫秒），从未联系过为 None
    pub last_contact_ms: Option<i64>,
    pub ping_count: i64,
    /// 24 小时内的连续心跳计数
    pub recent_pings_count: i32,
    /// 节流信号：在此时间前应拒绝处理该设备（本系统不强制）
    pub lockout_until_ms: Option<i64>,
    pub communication_method: CommunicationMethod,

    // 上报遥测
    pub last_known_location: Option<GeoLocation>,
    pub location_age_min: i32,
    pub vin: Option<String>,
    pub vehicle_information: Option<String>,
    pub is_high_voltage: bool,
    pub is_1939_app_support: bool,
    pub is_1939_supervisor_support: bool,
    pub is_1708_app_support: bool,
    pub is_1708_supervisor_support: bool,
    pub ble_state: BleState,
    pub modem_firmware_version: i32,
    pub board_version: i32,
    pub customer_application_version: i32,
    pub sim_type: i32,
    pub iccid: Option<String>,
    pub msisdn: Option<String>,
    pub imei: Option<String>,
    pub external_voltage: i32,
    pub battery_voltage: i32,
    pub modem_switcher: i32,
    pub thermistor: i32,
    pub command_count: i32,
    pub gps_state: i32,
    pub gsa_fix_mode: i32,
    pub gsv_sats_tracking: i32,
    pub num_sats: i32,
    pub sat_signals: Vec<SatSignal>,
    pub gsm_reg: i32,
    pub gprs_reg: i32,
    pub rssi: i32,
    pub gprs_attached: i32,
    pub is_gprs_active: bool,
    pub network_mode: Option<String>,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub lac: Option<String>,
    pub ci: Option<String>,
    pub operator: Option<String>,
    pub band: Option<String>,
    pub ip_address: Option<String>,
    pub delta_parameters: Option<String>,
    pub can_type: i32,
    pub bus_mode: i32,
    pub node_type: i32,
    pub baud_rate: i32,

    // 配置关联
    pub last_reported_standard_configuration_hash: Option<String>,
    pub last_reported_delta_configuration_hash: Option<String>,
    pub last_reported_standard_configuration: Option<String>,
    pub last_reported_delta_configuration: Option<String>,
    pub standard_configuration_title: Option<String>,
    pub delta_configuration_title: Option<String>,
    pub desired_delta_configuration: Option<String>,
    pub desired_delta_configuration_hash: Option<String>,
    pub desired_delta_configuration_title: Option<String>,
    pub desires_reset_config: bool,

    // 固件关联：版本字符串 + 解析出的固件记录引用与标题
    pub bluetooth_firmware_version: Option<String>,
    pub supervisor_firmware_version: Option<String>,
    pub application_firmware_version: Option<String>,
    pub last_reported_bluetooth_firmware: Option<String>,
    pub last_reported_supervisor_firmware: Option<String>,
    pub last_reported_application_firmware: Option<String>,
    pub bluetooth_firmware_version_title: Option<String>,
    pub supervisor_firmware_version_title: Option<String>,
    pub application_firmware_version_title: Option<String>,
    pub desired_bluetooth_firmware: Option<String>,
    pub desired_supervisor_firmware: Option<String>,
    pub desired_application_firmware: Option<String>,
    pub desired_bluetooth_firmware_title: Option<String>,
    pub desired_supervisor_firmware_title: Option<String>,
    pub desired_application_firmware_title: Option<String>,

    pub state: ConfigurationState,
    pub device_model: Option<String>,
    /// 用户标签（小写）
    pub tags: Vec<String>,
    /// 能力标签（大写），由心跳整体替换
    pub capabilities: Vec<String>,
    pub message: Option<String>,
    pub is_excluded_from_configuration_updates: bool,
    pub sim_source: Option<String>,
}

impl DeviceRecord {
    /// 首次收到未知设备心跳时创建的空记录。
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            serial_number: Some(serial_number.into()),
            ..Self::default()
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|item| item == tag)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// 需要建立索引的设备字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexField {
    SerialNumber,
    LastContact,
    Iccid,
    Vin,
    BluetoothFirmwareVersion,
    SupervisorFirmwareVersion,
    ApplicationFirmwareVersion,
    DesiredBluetoothFirmware,
    DesiredSupervisorFirmware,
    DesiredApplicationFirmware,
    StandardConfigurationHash,
    DesiredDeltaConfigurationHash,
    State,
    DeviceModel,
    Tags,
    Capabilities,
}

impl IndexField {
    /// 设备集合的默认索引集合。
    pub const DEVICE_DEFAULTS: [IndexField; 16] = [
        IndexField::SerialNumber,
        IndexField::LastContact,
        IndexField::Iccid,
        IndexField::Vin,
        IndexField::BluetoothFirmwareVersion,
        IndexField::SupervisorFirmwareVersion,
        IndexField::ApplicationFirmwareVersion,
        IndexField::DesiredBluetoothFirmware,
        IndexField::DesiredSupervisorFirmware,
        IndexField::DesiredApplicationFirmware,
        IndexField::StandardConfigurationHash,
        IndexField::DesiredDeltaConfigurationHash,
        IndexField::State,
        IndexField::DeviceModel,
        IndexField::Tags,
        IndexField::Capabilities,
    ];

    /// 文档中的键名。
    pub fn document_key(&self) -> &'static str {
        match self {
            IndexField::SerialNumber => "serial_number",
            IndexField::LastContact => "last_contact_ms",
            IndexField::Iccid => "iccid",
            IndexField::Vin => "vin",
            IndexField::BluetoothFirmwareVersion => "bluetooth_firmware_version",
            IndexField::SupervisorFirmwareVersion => "supervisor_firmware_version",
            IndexField::ApplicationFirmwareVersion => "application_firmware_version",
            IndexField::DesiredBluetoothFirmware => "desired_bluetooth_firmware",
            IndexField::DesiredSupervisorFirmware => "desired_supervisor_firmware",
            IndexField::DesiredApplicationFirmware => "desired_application_firmware",
            IndexField::StandardConfigurationHash => "last_reported_standard_configuration_hash",
            IndexField::DesiredDeltaConfigurationHash => "desired_delta_configuration_hash",
            IndexField::State => "state",
            IndexField::DeviceModel => "device_model",
            IndexField::Tags => "tags",
            IndexField::Capabilities => "capabilities",
        }
    }

    /// 数组字段（标签、能力）需要 GIN 索引。
    pub fn is_array(&self) -> bool {
        matches!(self, IndexField::Tags | IndexField::Capabilities)
    }
}
