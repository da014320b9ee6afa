/*!
 * Select Bridge
 * Hands readiness queries to handlers and normalizes the record
 */

use super::Dtable;
use crate::core::errors::{DtableError, DtableResult};
use crate::core::types::Fd;
use crate::handler::SelectRecord;
use crate::host::Readiness;
use tracing::debug;

impl Dtable {
    /// Read readiness for `fd`, accumulated into `record` when one is given
    pub fn select_read(&self, fd: Fd, record: Option<SelectRecord>) -> DtableResult<SelectRecord> {
        self.select(fd, Readiness::Read, record)
    }

    pub fn select_write(&self, fd: Fd, record: Option<SelectRecord>) -> DtableResult<SelectRecord> {
        self.select(fd, Readiness::Write, record)
    }

    pub fn select_except(&self, fd: Fd, record: Option<SelectRecord>) -> DtableResult<SelectRecord> {
        self.select(fd, Readiness::Except, record)
    }

    fn select(
        &self,
        fd: Fd,
        readiness: Readiness,
        record: Option<SelectRecord>,
    ) -> DtableResult<SelectRecord> {
        let state = self.state.read();
        let handler = state.get(fd).ok_or(DtableError::BadDescriptor(fd))?;

        let mut record = record.unwrap_or_default();
        let host = self.host.as_ref();
        match readiness {
            Readiness::Read => handler.select_read(host, &mut record),
            Readiness::Write => handler.select_write(host, &mut record),
            Readiness::Except => handler.select_except(host, &mut record),
        }
        record.fd = fd;
        record.handler = Some(handler.id());
        record.saw_error = false;

        debug!(fd, name = handler.name(), %readiness, ready = record.is_ready(), "select");
        Ok(record)
    }
}
