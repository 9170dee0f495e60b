//! Statement batching in front of a [`GraphAccessor`].

use tracing::debug;

use super::statement::Statement;
use crate::backend::GraphAccessor;
use crate::error::Result;

/// Queues statements and hands them to the accessor in batches.
pub struct GraphWriter<'a> {
    accessor: &'a mut dyn GraphAccessor,
    /// Flush once this many statements are pending; 0 never auto-flushes.
    batch_size: usize,
    pending: Vec<Statement>,
    statements: usize,
    batches: usize,
}

impl<'a> GraphWriter<'a> {
    /// Writer over a `Ready` accessor. `batch_size` 0 keeps everything
    /// until [`GraphWriter::flush`].
    pub fn new(accessor: &'a mut dyn GraphAccessor, batch_size: usize) -> Self {
        Self {
            accessor,
            batch_size,
            pending: Vec::new(),
            statements: 0,
            batches: 0,
        }
    }

    /// Flush what is pending, then run `statement` as its own transaction.
    pub fn execute_now(&mut self, statement: Statement) -> Result<()> {
        self.flush()?;
        self.accessor.execute_batch(std::slice::from_ref(&statement))?;
        self.statements += 1;
        self.batches += 1;
        Ok(())
    }

    /// Queue a statement, flushing when the batch is full.
    pub fn write(&mut self, statement: Statement) -> Result<()> {
        self.pending.push(statement);
        if self.batch_size > 0 && self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Send the pending statements as one batch. Nothing pending is a no-op.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        debug!(
            backend = self.accessor.backend_name(),
            statements = batch.len(),
            "flushing batch"
        );
        self.accessor.execute_batch(&batch)?;
        self.statements += batch.len();
        self.batches += 1;
        Ok(())
    }

    /// Statements queued but not yet sent.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Statements successfully executed so far.
    pub fn statements(&self) -> usize {
        self.statements
    }

    /// Batches successfully executed so far, `execute_now` included.
    pub fn batches(&self) -> usize {
        self.batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingAccessor;

    #[test]
    fn test_batches_flush_at_size() {
        let mut accessor = RecordingAccessor::ready();
        let log = accessor.log.clone();
        let mut writer = GraphWriter::new(&mut accessor, 2);
        for i in 0..5 {
            writer.write(Statement::raw(format!("CREATE (n:Type {{qualified_name: '{i}'}})"))).unwrap();
        }
        assert_eq!(writer.pending(), 1);
        writer.flush().unwrap();
        assert_eq!(writer.statements(), 5);
        assert_eq!(writer.batches(), 3);

        let sizes: Vec<usize> = log.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_zero_batch_size_is_single_transaction() {
        let mut accessor = RecordingAccessor::ready();
        let log = accessor.log.clone();
        let mut writer = GraphWriter::new(&mut accessor, 0);
        for _ in 0..1000 {
            writer.write(Statement::raw("MERGE (n:Type {qualified_name: 'x'})")).unwrap();
        }
        writer.flush().unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.batches(), 1);
        assert_eq!(log.lock().unwrap()[0].len(), 1000);
    }

    #[test]
    fn test_execute_now_flushes_pending_first() {
        let mut accessor = RecordingAccessor::ready();
        let log = accessor.log.clone();
        let mut writer = GraphWriter::new(&mut accessor, 10);
        writer.write(Statement::raw("first")).unwrap();
        writer.execute_now(Statement::raw("second")).unwrap();
        assert_eq!(
            RecordingAccessor::texts(&log),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn test_failed_flush_is_not_counted() {
        let mut accessor = RecordingAccessor::ready().failing_on("bad");
        let mut writer = GraphWriter::new(&mut accessor, 0);
        writer.write(Statement::raw("bad")).unwrap();
        assert!(writer.flush().is_err());
        assert_eq!(writer.statements(), 0);
    }
}
