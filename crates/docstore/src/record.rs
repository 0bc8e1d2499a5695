//! The [`Record`] trait implemented by every type a controller stores.

use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// A type that can be stored as one document in a collection.
///
/// Encoding goes through `serde` and the `bson` crate, so the document shape
/// is whatever the type's `Serialize` / `Deserialize` impls produce. The
/// identifier is the `_id` field and must be set by the caller.
///
/// The two stamping hooks are no-ops unless overridden. The controller calls
/// `stamp_created` and `stamp_updated` with the same instant on create, and
/// only `stamp_updated` on update. Types with `created_at` / `updated_at`
/// fields can use [`timestamped_record!`](crate::timestamped_record).
///
/// Attribute updates never decode the record, so they write `updated_at`
/// from [`updated_at_value`](Record::updated_at_value). It must produce the
/// same BSON the type's own `updated_at` field serializes to.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    fn stamp_created(&mut self, now: DateTime<Utc>) {
        let _ = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        let _ = now;
    }

    /// Encoding of `now` stored in `updated_at`. Defaults to a BSON datetime.
    fn updated_at_value(now: DateTime<Utc>) -> Result<Bson, bson::ser::Error>
    where
        Self: Sized,
    {
        Ok(Bson::DateTime(bson::DateTime::from_chrono(now)))
    }
}

/// Raw documents are records with no timestamp hooks.
impl Record for Document {}

/// Implement [`Record`] for a struct whose timestamp fields are
/// `DateTime<Utc>` or `Option<DateTime<Utc>>`.
///
/// By default the fields are assumed to use chrono's own serde encoding
/// (RFC 3339 strings). Add `bson_datetime` when they are serialized with
/// `bson::serde_helpers::chrono_datetime_as_bson_datetime`.
///
/// ```ignore
/// timestamped_record!(User);                       // created_at / updated_at
/// timestamped_record!(Order, placed_at, touched_at);
/// timestamped_record!(Account, bson_datetime);
/// timestamped_record!(Invoice, issued_at, touched_at, bson_datetime);
/// ```
#[macro_export]
macro_rules! timestamped_record {
    ($ty:ty) => {
        $crate::timestamped_record!($ty, created_at, updated_at);
    };
    ($ty:ty, bson_datetime) => {
        $crate::timestamped_record!($ty, created_at, updated_at, bson_datetime);
    };
    ($ty:ty, $created:ident, $updated:ident) => {
        impl $crate::Record for $ty {
            fn stamp_created(&mut self, now: $crate::chrono::DateTime<$crate::chrono::Utc>) {
                self.$created = ::core::convert::Into::into(now);
            }

            fn stamp_updated(&mut self, now: $crate::chrono::DateTime<$crate::chrono::Utc>) {
                self.$updated = ::core::convert::Into::into(now);
            }

            fn updated_at_value(
                now: $crate::chrono::DateTime<$crate::chrono::Utc>,
            ) -> ::core::result::Result<$crate::bson::Bson, $crate::bson::ser::Error> {
                $crate::bson::to_bson(&now)
            }
        }
    };
    ($ty:ty, $created:ident, $updated:ident, bson_datetime) => {
        impl $crate::Record for $ty {
            fn stamp_created(&mut self, now: $crate::chrono::DateTime<$crate::chrono::Utc>) {
                self.$created = ::core::convert::Into::into(now);
            }

            fn stamp_updated(&mut self, now: $crate::chrono::DateTime<$crate::chrono::Utc>) {
                self.$updated = ::core::convert::Into::into(now);
            }
        }
    };
}
