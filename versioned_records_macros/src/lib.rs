mod record;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Record)] derive macro
// ============================================================================

/// Derive macro for the `Record` trait.
///
/// Also generates the typed partial-update struct used by
/// `VersionedRecordStore::update`.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Record)]
/// #[record(collection = "flight_fares")]
/// pub struct FlightFare {
///     pub flight_number: String,
///     pub base_price: f64,
///     pub effective_to: Option<DateTime<Utc>>,
/// }
///
/// // generated:
/// // pub struct FlightFarePatch {
/// //     pub flight_number: Option<String>,
/// //     pub base_price: Option<f64>,
/// //     pub effective_to: Option<DateTime<Utc>>,
/// // }
/// ```
///
/// - `#[record(collection = "...")]` sets the collection name.
///   If omitted, defaults to snake_case struct name + "s".
/// - `#[record(patch = "...")]` renames the generated patch struct.
///   If omitted, defaults to `<Name>Patch`.
///
/// Patch fields that are `None` are skipped on serialization, so a patch
/// serializes to exactly the set of columns it changes. Unknown fields are
/// rejected when deserializing a patch.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record(input)
}
