//! Header mapper: parsed document header to the ten canonical header fields.

use crate::{batch::HeaderFields, document::ParsedBatchDocument};

/// Maps the document header onto [`HeaderFields`].
///
/// A missing header section yields [`HeaderFields::unset`]. A present header
/// yields ten non-`NULL` values, with `""` standing in for any field the
/// document omitted. Nothing is inferred from the batch or payer sections.
pub fn map_header(doc: &ParsedBatchDocument) -> HeaderFields {
    let Some(h) = &doc.header else {
        return HeaderFields::unset();
    };

    HeaderFields {
        transaction_type: Some(or_unset(&h.transaction_type)),
        transaction_sequence: Some(or_unset(&h.transaction_sequence)),
        registration_date: Some(or_unset(&h.registration_date)),
        registration_time: Some(or_unset(&h.registration_time)),
        provider_tax_id: Some(or_unset(&h.provider_tax_id)),
        provider_name: Some(or_unset(&h.provider_name)),
        payer_registry: Some(or_unset(&h.payer_registry)),
        standard_version: Some(or_unset(&h.standard_version)),
        hash: Some(or_unset(&h.hash)),
        cnes: Some(or_unset(&h.cnes)),
    }
}

fn or_unset(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}
