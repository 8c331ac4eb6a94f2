//! Merging fetched values into a blocking caller's response.

use std::collections::HashMap;

/// Overlay every fetched pair onto the cache-served values.
///
/// Fetched values win, including over stale values for keys that only rode
/// along in the batch: a caller that already waited gets the freshest data
/// available for everything it waited on.
pub fn merge_fetched(
    mut served: HashMap<String, Vec<u8>>,
    fetched: HashMap<String, Vec<u8>>,
) -> HashMap<String, Vec<u8>> {
    served.extend(fetched);
    served
}
