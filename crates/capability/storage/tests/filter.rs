use domain::ConfigurationState;
use fleet_storage::{
    Constraint, DeviceFilter, DeviceOrder, DeviceRecord, FirmwareField, HashField, SortField,
    TextField, compare_records,
};
use std::cmp::Ordering;

fn record() -> DeviceRecord {
    let mut record = DeviceRecord::new("d-1", "tenant-1", "123-XYZ");
    record.iccid = Some("8901-555".to_string());
    record.tags = vec!["north".to_string(), "fleet-a".to_string()];
    record.capabilities = vec!["BLE".to_string()];
    record.last_reported_standard_configuration_hash = Some("h-1".to_string());
    record.application_firmware_version = Some("5".to_string());
    record.last_contact_ms = Some(1_000);
    record
}

#[test]
fn prefix_or_suffix_matches_either_end() {
    let r = record();
    let prefix = Constraint::PrefixOrSuffix {
        field: TextField::SerialNumber,
        needle: "123".to_string(),
    };
    let suffix = Constraint::PrefixOrSuffix {
        field: TextField::SerialNumber,
        needle: "XYZ".to_string(),
    };
    let middle = Constraint::PrefixOrSuffix {
        field: TextField::SerialNumber,
        needle: "-X".to_string(),
    };
    assert!(prefix.matches(&r));
    assert!(suffix.matches(&r));
    assert!(!middle.matches(&r));

    let vin = Constraint::PrefixOrSuffix {
        field: TextField::Vin,
        needle: "1".to_string(),
    };
    assert!(!vin.matches(&r), "absent value never matches");
}

#[test]
fn contact_bounds_treat_never_contacted_as_oldest() {
    let mut r = record();
    assert!(Constraint::ContactBefore(2_000).matches(&r));
    assert!(!Constraint::ContactBefore(1_000).matches(&r));
    assert!(Constraint::ContactAfter(999).matches(&r));
    assert!(!Constraint::ContactAfter(1_000).matches(&r));

    r.last_contact_ms = None;
    assert!(Constraint::ContactBefore(0).matches(&r));
    assert!(!Constraint::ContactAfter(i64::MIN).matches(&r));
}

#[test]
fn tag_constraints() {
    let r = record();
    let tags = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    assert!(Constraint::HasAllTags(tags(&["north", "fleet-a"])).matches(&r));
    assert!(!Constraint::HasAllTags(tags(&["north", "south"])).matches(&r));
    assert!(Constraint::HasAnyTag(tags(&["south", "north"])).matches(&r));
    assert!(!Constraint::HasAnyTag(Vec::new()).matches(&r));
    assert!(Constraint::HasNoTag(tags(&["south"])).matches(&r));
    assert!(!Constraint::HasNoTag(tags(&["north"])).matches(&r));
    assert!(Constraint::HasAnyCapability(tags(&["BLE", "GPS"])).matches(&r));
}

#[test]
fn hash_and_firmware_constraints() {
    let r = record();
    assert!(
        Constraint::HashIn {
            field: HashField::Standard,
            hashes: vec!["h-0".to_string(), "h-1".to_string()],
        }
        .matches(&r)
    );
    assert!(
        !Constraint::HashIn {
            field: HashField::Delta,
            hashes: Vec::new(),
        }
        .matches(&r)
    );
    assert!(
        Constraint::FirmwareIs {
            field: FirmwareField::Application,
            version: "5".to_string(),
        }
        .matches(&r)
    );
    assert!(Constraint::StateIs(ConfigurationState::New).matches(&r));
}

#[test]
fn empty_filter_matches_everything() {
    assert!(DeviceFilter::all().matches(&DeviceRecord::default()));
    let filter = DeviceFilter::all()
        .with(Constraint::StateIs(ConfigurationState::New))
        .with(Constraint::ContactAfter(5_000));
    assert!(!filter.matches(&record()));
}

#[test]
fn sort_field_names_fold_case_and_underscores() {
    assert_eq!(SortField::parse("LastContact"), Some(SortField::LastContact));
    assert_eq!(SortField::parse("last_contact"), Some(SortField::LastContact));
    assert_eq!(SortField::parse("iccid"), Some(SortField::Iccid));
    assert_eq!(SortField::parse("NoSuchField"), None);
    assert_eq!(SortField::parse(""), None);
}

#[test]
fn compare_orders_missing_values_first() {
    let a = DeviceRecord::new("a", "t", "S");
    let mut b = DeviceRecord::new("b", "t", "S");
    b.vin = Some("V".to_string());
    let asc = DeviceOrder::asc(SortField::Vin);
    assert_eq!(compare_records(&a, &b, Some(&asc)), Ordering::Less);
    let desc = DeviceOrder::desc(SortField::Vin);
    assert_eq!(compare_records(&a, &b, Some(&desc)), Ordering::Greater);
    assert_eq!(compare_records(&a, &b, None), Ordering::Less);
}
