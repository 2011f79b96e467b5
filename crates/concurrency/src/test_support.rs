//! Minimal driver used by unit tests

use txroute_core::{Connection, Error, Result, Transaction, TxOptions};

#[derive(Debug, Default)]
pub(crate) struct NullConn {
    pub id: usize,
    pub fail_close: bool,
}

impl NullConn {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            fail_close: false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct NullTx;

impl Transaction for NullTx {
    fn commit(self) -> Result<()> {
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        Ok(())
    }
}

impl Connection for NullConn {
    type Tx = NullTx;

    fn begin(&self, _options: &TxOptions) -> Result<NullTx> {
        Ok(NullTx)
    }

    fn close(&self) -> Result<()> {
        if self.fail_close {
            Err(Error::Connect("already closed".into()))
        } else {
            Ok(())
        }
    }
}
