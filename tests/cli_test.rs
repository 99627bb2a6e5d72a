mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use common::{merchants_fixture, order_row, write_orders};
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_cli_scripted_outcomes() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("orders.csv");
    write_orders(
        &input,
        &[
            order_row("O1", "QR_CODE", "12.50", "CONFIRM_SUCCESS"),
            order_row("O2", "QR_CODE", "3.00", "CONFIRM_FAIL"),
            order_row("O3", "QR_CODE", "4.00", "WAITING"),
            order_row("O4", "QR_CASHIER", "5.00", ""),
            order_row("O5", "QR_CODE", "6.00", "SYS_ERROR"),
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("unipay"));
    cmd.arg(&input).arg("--merchants").arg(merchants_fixture());

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with(
            "mch_order_no,pay_order_id,code,msg,state\n",
        ))
        .stdout(predicate::str::is_match(r"O1,P\d{21},0,SUCCESS,SUCCESS").unwrap())
        .stdout(predicate::str::is_match(r"O2,P\d{21},0,SUCCESS,FAIL").unwrap())
        .stdout(predicate::str::is_match(r"O3,P\d{21},0,SUCCESS,ING").unwrap())
        .stdout(predicate::str::is_match(r"O4,P\d{21},0,SUCCESS,INIT").unwrap())
        .stdout(predicate::str::contains(
            "O5,,9999,sandbox connection refused,",
        ));
}

#[test]
fn test_cli_rejects_duplicates_and_unknown_routes() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("orders.csv");
    write_orders(
        &input,
        &[
            order_row("O1", "QR_CODE", "1.00", "CONFIRM_SUCCESS"),
            order_row("O1", "QR_CODE", "1.00", "CONFIRM_SUCCESS"),
            order_row("O2", "WX_NATIVE", "1.00", ""),
            order_row("O3", "ALI_JSAPI", "1.00", ""),
            order_row("O4", "BAR_CODE", "1.00", "CONFIRM_SUCCESS"),
            order_row("O5", "QR_CODE", "0", "CONFIRM_SUCCESS"),
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("unipay"));
    cmd.arg(&input).arg("--merchants").arg(merchants_fixture());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "O1,,9999,merchant order [O1] already exists for merchant M1,",
        ))
        .stdout(predicate::str::contains(
            "O2,,9999,merchant app does not support this pay way,",
        ))
        .stdout(predicate::str::contains(
            "O3,,9999,merchant app does not support this pay way,",
        ))
        .stdout(predicate::str::contains(
            "O4,,9999,auth code is required for bar code payments,",
        ))
        .stdout(predicate::str::contains("O5,,9999,amount must be positive,"));
}

#[test]
fn test_cli_isv_sub_merchant() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("orders.csv");
    let mut row = order_row("B1", "QR_CODE", "2.00", "CONFIRM_SUCCESS");
    row[0] = "M2".to_string();
    row[1] = "A2".to_string();
    write_orders(&input, &[row]).unwrap();

    let mut cmd = Command::new(cargo_bin!("unipay"));
    cmd.arg(&input).arg("--merchants").arg(merchants_fixture());

    cmd.assert()
        .success()
        .stdout(predicate::str::is_match(r"B1,P\d{21},0,SUCCESS,SUCCESS").unwrap());
}

#[test]
fn test_cli_requires_merchant_catalog() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("orders.csv");
    write_orders(&input, &[order_row("O1", "QR_CODE", "1.00", "")]).unwrap();

    let mut cmd = Command::new(cargo_bin!("unipay"));
    cmd.arg(&input)
        .arg("--merchants")
        .arg(dir.path().join("missing.json"))
        .env_remove("UNIPAY_MERCHANTS");

    cmd.assert().failure();
}
