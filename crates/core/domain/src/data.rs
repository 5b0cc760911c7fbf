use serde::{Deserialize, Serialize};

/// 设备上报的地理位置。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// 单颗卫星的信号读数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatSignal {
    pub sat_id: i32,
    pub snr: i32,
}

/// 蓝牙模块当前状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BleState {
    #[default]
    Unknown,
    Off,
    Advertising,
    Connected,
    Fault,
}

/// 设备与平台的通信方式（由接入层给出，不来自报文本身）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommunicationMethod {
    #[default]
    Unknown,
    Cellular,
    Sms,
    Api,
}

/// 设备的一次心跳报文（ping）。
///
/// 字符串字段为空或空白表示"本次未提供"，而非清空；
/// 数值与布尔字段每次都会覆盖记录中的对应值。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingReport {
    pub serial_number: String,
    /// 报文时间（Unix 毫秒）
    pub ping_time_ms: i64,

    pub location: Option<GeoLocation>,
    pub location_age_min: i32,
    pub vin: Option<String>,

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
    pub operator: Option<String>,
    pub band: Option<String>,

    pub can_type: i32,
    pub bus_mode: i32,
    pub node_type: i32,
    pub baud_rate: i32,

    /// 与标准配置不同的参数块
    pub delta_parameters: Option<String>,
    /// 标准配置哈希
    pub standard_hash: Option<String>,
    /// 差量配置哈希（"0" 表示无差量）
    pub delta_hash: Option<String>,

    pub ble_version: u32,
    pub supervisor_version: u32,
    pub application_version: Option<String>,

    /// 能力标签（非空时整体替换记录中的能力集）
    pub capabilities: Vec<String>,
}
