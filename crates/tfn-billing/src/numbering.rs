use serde::{Deserialize, Serialize};

/// Display format of bill numbers: prefix + zero-padded sequence.
///
/// The sequence itself comes from the store's atomic counter; this type only
/// renders it. With a fixed width the result sorts lexicographically in
/// issue order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillNumbering {
    pub prefix: String,
    pub width: usize,
}

impl Default for BillNumbering {
    fn default() -> Self {
        Self {
            prefix: "BILL".to_string(),
            width: 6,
        }
    }
}

impl BillNumbering {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    pub fn format(&self, seq: u64) -> String {
        format!("{}{:0width$}", self.prefix, seq, width = self.width)
    }
}
