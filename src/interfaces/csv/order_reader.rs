use crate::domain::request::UnifiedOrderRequest;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One line of the order input file.
#[derive(Debug, Deserialize)]
struct OrderRow {
    mch_no: String,
    app_id: String,
    mch_order_no: String,
    way_code: String,
    amount: Decimal,
    currency: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    client_ip: Option<String>,
    #[serde(default)]
    notify_url: Option<String>,
    #[serde(default)]
    return_url: Option<String>,
    #[serde(default)]
    channel_extra: Option<String>,
    #[serde(default)]
    ext_param: Option<String>,
}

impl From<OrderRow> for UnifiedOrderRequest {
    fn from(row: OrderRow) -> Self {
        Self {
            mch_no: row.mch_no,
            app_id: row.app_id,
            mch_order_no: row.mch_order_no,
            way_code: row.way_code,
            amount: row.amount,
            currency: row.currency,
            subject: row.subject,
            body: row.body,
            client_ip: row.client_ip,
            notify_url: row.notify_url,
            return_url: row.return_url,
            channel_user: None,
            channel_extra: row.channel_extra,
            ext_param: row.ext_param,
            pay_data_type: None,
        }
    }
}

/// Reads unified-order requests from a CSV source.
///
/// Fields are trimmed and short rows are accepted, trailing optional
/// columns may be left out.
pub struct OrderRequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderRequestReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one request per row.
    pub fn requests(self) -> impl Iterator<Item = Result<UnifiedOrderRequest>> {
        self.reader.into_deserialize::<OrderRow>().map(|result| {
            result
                .map(UnifiedOrderRequest::from)
                .map_err(PaymentError::from)
        })
    }
}
