// Per-service id counters. Callers run `allocate` inside the write
// transaction that inserts the row consuming the id, so a rolled back insert
// also rolls back the counter.
use crate::connection::{map_db_err, DbConn};
use crate::schema::service_sequences::dsl;
use diesel::prelude::*;
use service_core::sequence::format_id;
use service_core::{Result, SequenceKind, StoreError};

/// Creates the counters of a new service, all at zero.
pub(crate) fn init_sequences(conn: &mut DbConn, service_id: &str) -> Result<()> {
  for kind in SequenceKind::ALL {
    map_db_err(diesel::insert_into(dsl::service_sequences).values((dsl::service_id.eq(service_id),
                                                                   dsl::sequence_name.eq(kind.as_str()),
                                                                   dsl::last_id.eq(0i64)))
                                                          .execute(conn))?;
  }
  Ok(())
}

/// Bumps the counter and returns the formatted id. `NotFound` when the
/// service has no counter row (the service does not exist).
pub(crate) fn allocate(conn: &mut DbConn, service_id: &str, kind: SequenceKind) -> Result<String> {
  let counter = dsl::service_sequences.filter(dsl::service_id.eq(service_id))
                                      .filter(dsl::sequence_name.eq(kind.as_str()));
  let updated = map_db_err(diesel::update(counter.clone()).set(dsl::last_id.eq(dsl::last_id + 1)).execute(conn))?;
  if updated == 0 {
    return Err(StoreError::NotFound(format!("service [{}]", service_id)));
  }
  let last: i64 = map_db_err(counter.select(dsl::last_id).first(conn))?;
  Ok(format_id(last))
}

pub(crate) fn drop_sequences(conn: &mut DbConn, service_id: &str) -> Result<usize> {
  map_db_err(diesel::delete(dsl::service_sequences.filter(dsl::service_id.eq(service_id))).execute(conn))
}
