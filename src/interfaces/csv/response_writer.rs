use crate::domain::request::{ApiResponse, UnifiedOrderResponse};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// One output line per processed request.
#[derive(Debug, Serialize, PartialEq)]
pub struct ResponseRow {
    pub mch_order_no: String,
    pub pay_order_id: String,
    pub code: i32,
    pub msg: String,
    pub state: String,
}

impl ResponseRow {
    /// Flattens an envelope. Order fields stay empty when the request was rejected.
    pub fn from_response(mch_order_no: &str, response: &ApiResponse) -> Self {
        let data = response.data_as::<UnifiedOrderResponse>();
        Self {
            mch_order_no: mch_order_no.to_string(),
            pay_order_id: data
                .as_ref()
                .map(|d| d.pay_order_id.clone())
                .unwrap_or_default(),
            code: response.code,
            msg: response.msg.clone(),
            state: data
                .map(|d| d.order_state.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}

pub struct ResponseWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, row: &ResponseRow) -> Result<()> {
        self.writer.serialize(row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_are_written_with_header() {
        let mut buffer = Vec::new();
        {
            let mut writer = ResponseWriter::new(&mut buffer);
            let ok = ApiResponse::ok(json!({
                "payOrderId": "P1",
                "mchOrderNo": "O1",
                "orderState": "SUCCESS",
                "payDataType": "none"
            }));
            writer.write(&ResponseRow::from_response("O1", &ok)).unwrap();

            let rejected = ApiResponse::custom_fail("amount must be positive");
            writer.write(&ResponseRow::from_response("O2", &rejected)).unwrap();
            writer.flush().unwrap();
        }

        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(
            output,
            "mch_order_no,pay_order_id,code,msg,state\n\
             O1,P1,0,SUCCESS,SUCCESS\n\
             O2,,9999,amount must be positive,\n"
        );
    }
}
