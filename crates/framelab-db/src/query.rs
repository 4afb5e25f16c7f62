//! PostgREST query string builder.
//!
//! ```
//! use framelab_db::Query;
//!
//! let q = Query::new()
//!     .select("id,frame_number")
//!     .eq("video_id", "v1")
//!     .order("frame_number", true)
//!     .limit(100);
//! assert_eq!(
//!     q.to_query_string(),
//!     "select=id%2Cframe_number&video_id=eq.v1&order=frame_number.asc&limit=100"
//! );
//! ```

/// Filter, ordering and pagination parameters for one table request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }

    /// Columns to return.
    pub fn select(self, columns: &str) -> Self {
        self.push("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: impl AsRef<str>) -> Self {
        self.push(column, format!("eq.{}", value.as_ref()))
    }

    pub fn gte(self, column: &str, value: impl AsRef<str>) -> Self {
        self.push(column, format!("gte.{}", value.as_ref()))
    }

    pub fn lte(self, column: &str, value: impl AsRef<str>) -> Self {
        self.push(column, format!("lte.{}", value.as_ref()))
    }

    /// `column IN (values)`. Values are double-quoted so commas survive.
    pub fn in_list<I, S>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let quoted: Vec<String> = values
            .into_iter()
            .map(|v| format!("\"{}\"", v.as_ref().replace('"', "\\\"")))
            .collect();
        self.push(column, format!("in.({})", quoted.join(",")))
    }

    pub fn order(self, column: &str, ascending: bool) -> Self {
        let dir = if ascending { "asc" } else { "desc" };
        self.push("order", format!("{}.{}", column, dir))
    }

    pub fn limit(self, n: usize) -> Self {
        self.push("limit", n.to_string())
    }

    pub fn offset(self, n: usize) -> Self {
        self.push("offset", n.to_string())
    }

    /// Upsert conflict target for inserts.
    pub fn on_conflict(self, columns: &str) -> Self {
        self.push("on_conflict", columns.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Encode as `k=v&k=v` with percent-encoded values.
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
