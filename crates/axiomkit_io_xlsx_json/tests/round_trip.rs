use std::io::{Cursor, Read, Write};

use axiomkit_io_xlsx_json::{
    EnumCellValue, SpecRecord, SpecXlsxJsonWriteOptions, SpecXlsxReadOptions, XlsxJsonError,
    convert_records_to_json_string, derive_records_from_json_str, parse_xlsx_bytes_to_records,
    write_records_to_xlsx_bytes,
};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::{Format, Formula, Workbook};

fn create_record(l_items: Vec<(&str, EnumCellValue)>) -> SpecRecord {
    l_items
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn derive_text(val: &str) -> EnumCellValue {
    EnumCellValue::String(val.to_string())
}

fn create_people_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let fmt_date = Format::new().set_num_format("yyyy-mm-dd");

    for (n_col, c_header) in ["Họ và Tên", "Tuổi", "Ngày sinh", "Tổng", "Đã xác nhận"]
        .into_iter()
        .enumerate()
    {
        worksheet
            .write_string(0, n_col as u16, c_header)
            .expect("header");
    }

    worksheet.write_string(1, 0, "  Nguyễn An ").expect("cell");
    worksheet.write_number(1, 1, 30.0).expect("cell");
    worksheet
        .write_number_with_format(1, 2, 45306.0, &fmt_date)
        .expect("cell");
    worksheet
        .write_formula(1, 3, Formula::new("=1+2").set_result("3"))
        .expect("cell");
    worksheet.write_boolean(1, 4, true).expect("cell");

    worksheet.write_string(3, 0, "Trần Bình").expect("cell");
    worksheet.write_number(3, 1, 41.5).expect("cell");

    workbook.save_to_buffer().expect("save")
}

#[test]
fn parse_workbook_with_typed_cells() {
    let v_bytes = create_people_workbook();
    let l_records =
        parse_xlsx_bytes_to_records(&v_bytes, &SpecXlsxReadOptions::default()).expect("parse");

    assert_eq!(l_records.len(), 3);
    assert_eq!(
        l_records[0].keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["HO_VA_TEN", "TUOI", "NGAY_SINH", "TONG", "DA_XAC_NHAN"]
    );

    let dt_birth = NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid date");
    assert_eq!(
        l_records[0],
        create_record(vec![
            ("HO_VA_TEN", derive_text("Nguyễn An")),
            ("TUOI", EnumCellValue::Integer(30)),
            ("NGAY_SINH", EnumCellValue::DateTime(dt_birth)),
            ("TONG", EnumCellValue::Integer(3)),
            ("DA_XAC_NHAN", EnumCellValue::Boolean(true)),
        ])
    );

    assert!(l_records[1].values().all(EnumCellValue::is_null));
    assert_eq!(l_records[1].len(), 5);

    assert_eq!(l_records[2]["HO_VA_TEN"], derive_text("Trần Bình"));
    assert_eq!(l_records[2]["TUOI"], EnumCellValue::Float(41.5));
    assert_eq!(l_records[2]["NGAY_SINH"], EnumCellValue::Null);
}

#[test]
fn parse_workbook_with_selected_and_renamed_columns() {
    let v_bytes = create_people_workbook();
    let options = SpecXlsxReadOptions {
        column_indexes: Some(vec![1, 0, 9]),
        custom_keys: None,
        ..Default::default()
    };

    let l_records = parse_xlsx_bytes_to_records(&v_bytes, &options).expect("parse");
    assert_eq!(
        l_records[0].keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["TUOI", "HO_VA_TEN", "UNKNOWN_COL_9"]
    );
    assert_eq!(l_records[0]["UNKNOWN_COL_9"], EnumCellValue::Null);

    let options = SpecXlsxReadOptions {
        column_indexes: Some(vec![0, 2]),
        custom_keys: Some(vec!["name".to_string(), "born".to_string()]),
        ..Default::default()
    };
    let l_records = parse_xlsx_bytes_to_records(&v_bytes, &options).expect("parse");
    for record in &l_records {
        assert_eq!(
            record.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["name", "born"]
        );
    }
}

#[test]
fn parse_rejects_bad_selection_and_bad_bytes() {
    let options = SpecXlsxReadOptions {
        column_indexes: Some(vec![0, 1]),
        custom_keys: Some(vec!["x".to_string()]),
        ..Default::default()
    };
    let err = parse_xlsx_bytes_to_records(&create_people_workbook(), &options)
        .expect_err("length mismatch");
    assert_eq!(
        err,
        XlsxJsonError::InvalidRequest(
            "customKeys length (1) must equal columnIndexes length (2)".to_string()
        )
    );

    let err = parse_xlsx_bytes_to_records(b"PK\x03\x04 broken", &SpecXlsxReadOptions::default())
        .expect_err("corrupt container");
    assert!(matches!(err, XlsxJsonError::Processing(_)));
    assert!(err.to_string().starts_with("Failed to process xlsx: "));

    let options = SpecXlsxReadOptions {
        sheet_index: 3,
        ..Default::default()
    };
    let err = parse_xlsx_bytes_to_records(&create_people_workbook(), &options)
        .expect_err("missing sheet");
    assert!(matches!(err, XlsxJsonError::Processing(_)));
}

#[test]
fn generate_then_parse_reproduces_records() {
    let dt = NaiveDate::from_ymd_opt(2023, 7, 4)
        .and_then(|d| d.and_hms_opt(9, 15, 0))
        .expect("valid date");
    let l_records = vec![
        create_record(vec![
            ("NAME", derive_text("An")),
            ("SCORE", EnumCellValue::Float(8.25)),
            ("PASSED", EnumCellValue::Boolean(true)),
        ]),
        create_record(vec![
            ("NAME", derive_text("Bình")),
            ("AGE", EnumCellValue::Integer(27)),
            ("SEEN_AT", EnumCellValue::DateTime(dt)),
        ]),
        create_record(vec![
            ("SCORE", EnumCellValue::Null),
            ("NAME", derive_text("Chi")),
        ]),
    ];

    let v_bytes = write_records_to_xlsx_bytes(&l_records, &SpecXlsxJsonWriteOptions::default())
        .expect("write");
    let l_parsed =
        parse_xlsx_bytes_to_records(&v_bytes, &SpecXlsxReadOptions::default()).expect("parse");

    let l_keys = vec!["NAME", "SCORE", "PASSED", "AGE", "SEEN_AT"];
    assert_eq!(l_parsed.len(), 3);
    for record in &l_parsed {
        assert_eq!(record.keys().map(String::as_str).collect::<Vec<_>>(), l_keys);
    }

    assert_eq!(l_parsed[0]["NAME"], derive_text("An"));
    assert_eq!(l_parsed[0]["SCORE"], EnumCellValue::Float(8.25));
    assert_eq!(l_parsed[0]["PASSED"], EnumCellValue::Boolean(true));
    assert_eq!(l_parsed[0]["AGE"], EnumCellValue::Null);

    assert_eq!(l_parsed[1]["AGE"], EnumCellValue::Integer(27));
    assert_eq!(l_parsed[1]["SEEN_AT"], derive_text("2023-07-04T09:15:00"));
    assert_eq!(l_parsed[1]["PASSED"], EnumCellValue::Null);

    assert_eq!(l_parsed[2]["NAME"], derive_text("Chi"));
    assert_eq!(l_parsed[2]["SCORE"], EnumCellValue::Null);
}

#[test]
fn generate_uses_custom_sheet_name() {
    let options = SpecXlsxJsonWriteOptions {
        sheet_name: "Báo cáo/2024".to_string(),
        ..Default::default()
    };
    let l_records = vec![create_record(vec![("A", EnumCellValue::Integer(1))])];

    let v_bytes = write_records_to_xlsx_bytes(&l_records, &options).expect("write");
    let l_parsed =
        parse_xlsx_bytes_to_records(&v_bytes, &SpecXlsxReadOptions::default()).expect("parse");
    assert_eq!(l_parsed, vec![create_record(vec![("A", EnumCellValue::Integer(1))])]);
}

#[test]
fn generate_empty_records_yields_decodable_document() {
    let v_bytes = write_records_to_xlsx_bytes(&[], &SpecXlsxJsonWriteOptions::default())
        .expect("write");
    let err = parse_xlsx_bytes_to_records(&v_bytes, &SpecXlsxReadOptions::default())
        .expect_err("no header row");
    assert_eq!(err, XlsxJsonError::EmptyOrMissingHeader);
    assert_eq!(err.to_string(), "Excel file is empty or has no header row.");
}

#[test]
fn json_text_round_trips_through_workbook() {
    let txt_in = r#"[{"ID":1,"NAME":"An","RATE":0.5},null,{"ID":3,"TAGS":["a","b"]}]"#;

    let l_records = derive_records_from_json_str(txt_in).expect("decode");
    let v_bytes = write_records_to_xlsx_bytes(&l_records, &SpecXlsxJsonWriteOptions::default())
        .expect("write");
    let l_parsed =
        parse_xlsx_bytes_to_records(&v_bytes, &SpecXlsxReadOptions::default()).expect("parse");

    let txt_out = convert_records_to_json_string(&l_parsed).expect("encode");
    assert_eq!(
        txt_out,
        concat!(
            r#"[{"ID":1,"NAME":"An","RATE":0.5,"TAGS":null},"#,
            r#"{"ID":null,"NAME":null,"RATE":null,"TAGS":null},"#,
            r#"{"ID":3,"NAME":null,"RATE":null,"TAGS":"[\"a\",\"b\"]"}]"#
        )
    );
}

#[test]
fn parse_recomputes_formulas_without_cached_results() {
    let mut workbook = Workbook::new();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Orders").expect("sheet name");
    for (n_col, c_header) in ["Qty", "Total", "Priced", "Label"].into_iter().enumerate() {
        worksheet
            .write_string(0, n_col as u16, c_header)
            .expect("header");
    }
    worksheet.write_number(1, 0, 2.0).expect("cell");
    worksheet
        .write_formula(1, 1, Formula::new("=A2*21"))
        .expect("cell");
    worksheet
        .write_formula(1, 2, Formula::new("=A2*Rates!A1"))
        .expect("cell");
    worksheet
        .write_formula(1, 3, Formula::new("=\"n=\"&B2").set_result("stale"))
        .expect("cell");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Rates").expect("sheet name");
    worksheet.write_number(0, 0, 10.0).expect("cell");

    let v_bytes = workbook.save_to_buffer().expect("save");
    let l_records =
        parse_xlsx_bytes_to_records(&v_bytes, &SpecXlsxReadOptions::default()).expect("parse");

    assert_eq!(
        l_records,
        vec![create_record(vec![
            ("QTY", EnumCellValue::Integer(2)),
            ("TOTAL", EnumCellValue::Integer(42)),
            ("PRICED", EnumCellValue::Integer(20)),
            ("LABEL", derive_text("n=42")),
        ])]
    );
}

/// Rewrite `xl/workbook.xml` so the package declares the 1904 date system.
fn convert_to_1904_date_system(v_bytes: &[u8]) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(v_bytes)).expect("zip");
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

    for n_idx in 0..archive.len() {
        let mut part = archive.by_index(n_idx).expect("package part");
        let c_name = part.name().to_string();
        let mut v_part = Vec::new();
        part.read_to_end(&mut v_part).expect("read part");

        if c_name == "xl/workbook.xml" {
            let txt = String::from_utf8(v_part).expect("utf-8 workbook part");
            v_part = txt
                .replace("<workbookPr ", r#"<workbookPr date1904="1" "#)
                .into_bytes();
        }

        writer
            .start_file(c_name, zip::write::FileOptions::default())
            .expect("start part");
        writer.write_all(&v_part).expect("write part");
    }

    writer.finish().expect("finish zip").into_inner()
}

#[test]
fn parse_honors_1904_date_system() {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let fmt_datetime = Format::new().set_num_format("yyyy-mm-dd hh:mm");
    worksheet.write_string(0, 0, "Ngày").expect("header");
    worksheet.write_string(0, 1, "Số").expect("header");
    worksheet
        .write_number_with_format(1, 0, 1.5, &fmt_datetime)
        .expect("cell");
    worksheet.write_number(1, 1, 1.5).expect("cell");

    let v_bytes = convert_to_1904_date_system(&workbook.save_to_buffer().expect("save"));
    let l_records =
        parse_xlsx_bytes_to_records(&v_bytes, &SpecXlsxReadOptions::default()).expect("parse");

    let dt = NaiveDate::from_ymd_opt(1904, 1, 2)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid date");
    assert_eq!(
        l_records,
        vec![create_record(vec![
            ("NGAY", EnumCellValue::DateTime(dt)),
            ("SO", EnumCellValue::Float(1.5)),
        ])]
    );
}

#[test]
fn parse_treats_only_ascii_whitespace_as_separator() {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.write_string(0, 0, "Mã\u{00A0}số").expect("header");
    worksheet.write_string(0, 1, "Mã số").expect("header");
    worksheet.write_string(1, 0, "\u{00A0}A1 ").expect("cell");
    worksheet.write_string(1, 1, "B1").expect("cell");

    let v_bytes = workbook.save_to_buffer().expect("save");
    let l_records =
        parse_xlsx_bytes_to_records(&v_bytes, &SpecXlsxReadOptions::default()).expect("parse");

    assert_eq!(
        l_records,
        vec![create_record(vec![
            ("MASO", derive_text("\u{00A0}A1")),
            ("MA_SO", derive_text("B1")),
        ])]
    );
}
