mod handler;
mod model;
pub mod photo;

pub use handler::{
    create_entry, date_range, delete_entry, delete_multiple, get_entry, list_entries,
    manual_cleanup, statistics, update_entry, upload_photo,
};
pub use model::{
    CreateEntryRequest, Destinations, EntryStatistics, Purged, UpdateEntryRequest, VehicleEntry,
};
