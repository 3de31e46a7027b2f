use super::*;

#[test]
fn defaults_fund_the_dev_manager() {
    let settings = Settings::default();
    assert_eq!(settings.manager, DEV_MANAGER);
    assert_eq!(settings.genesis.len(), 1);
    assert_eq!(settings.genesis[0].address, settings.manager);
    assert!(settings.genesis[0].balance > Wei::ZERO);
}

#[test]
fn file_settings_parse_genesis_accounts() {
    let raw = r#"
bind_addr = "0.0.0.0:9000"
manager = "0x00000000000000000000000000000000000000ab"
submission_fee = "5000"

[[genesis]]
address = "0x00000000000000000000000000000000000000ab"
balance = "1000000"

[[genesis]]
address = "0x00000000000000000000000000000000000000cd"
balance = "250"
"#;
    let parsed: FileSettings = toml::from_str(raw).expect("parse");
    assert_eq!(parsed.bind_addr.as_deref(), Some("0.0.0.0:9000"));
    assert_eq!(parsed.submission_fee, Some(Wei(5_000)));
    let genesis = parsed.genesis.expect("genesis");
    assert_eq!(genesis.len(), 2);
    assert_eq!(genesis[1].balance, Wei(250));
}

#[test]
fn partial_file_settings_leave_other_fields_alone() {
    let raw = r#"database_url = "sqlite://./elsewhere.db""#;
    let parsed: FileSettings = toml::from_str(raw).expect("parse");
    assert_eq!(parsed.database_url.as_deref(), Some("sqlite://./elsewhere.db"));
    assert!(parsed.manager.is_none());
    assert!(parsed.genesis.is_none());
}
