use async_trait::async_trait;
use tfn_schemas::{
    AttendanceFilter, AttendanceKey, AttendanceRecord, NewAttendance, Page, PageRequest, Result,
};
use uuid::Uuid;

/// Persistence contract for the ledger.
///
/// Implementations MUST enforce uniqueness of [`AttendanceKey`] atomically
/// with the insert, and MUST make `insert_attendance_batch` all-or-nothing.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// `Conflict` if the key already exists; nothing is written.
    async fn insert_attendance(&self, row: NewAttendance) -> Result<AttendanceRecord>;

    /// Single transaction. Any violation rolls back every row.
    async fn insert_attendance_batch(&self, rows: Vec<NewAttendance>)
        -> Result<Vec<AttendanceRecord>>;

    /// Existing records whose key is in `keys`.
    async fn find_existing_attendance(&self, keys: &[AttendanceKey])
        -> Result<Vec<AttendanceRecord>>;

    async fn get_attendance(&self, id: Uuid) -> Result<Option<AttendanceRecord>>;

    /// Sorted by date desc, then meal type asc.
    async fn query_attendance(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>>;

    /// Every match, sorted by date asc, then meal type asc.
    async fn fetch_attendance(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>>;

    /// Overwrite the fields of an existing record in place; `recorded_by`
    /// and `created_at` are kept. `Conflict` if the new key belongs to a
    /// different record, `None` if `id` is absent.
    async fn update_attendance(&self, id: Uuid, row: NewAttendance)
        -> Result<Option<AttendanceRecord>>;

    /// Hard delete. Returns the removed row, `None` if absent.
    async fn delete_attendance(&self, id: Uuid) -> Result<Option<AttendanceRecord>>;
}
