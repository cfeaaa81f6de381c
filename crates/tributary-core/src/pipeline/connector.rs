//! Graph leaves: sources and sinks.
//!
//! The builder only needs a source to be a named leaf with an element type
//! and a sink to be a named terminal. The read and write functions are what
//! the local executor calls.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::execution::ExecutionError;
use crate::Element;

use super::transform::{
    elements, Batch, Body, Partition, SinkWriter, SourceReader, Transform, TransformKind,
};

type ReadFn<T> = Arc<dyn Fn() -> Vec<T> + Send + Sync>;
type WriteFn<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

/// A named producer of elements.
pub struct Source<T> {
    name: String,
    read: ReadFn<T>,
}

impl<T: Element> Source<T> {
    /// A source that yields a copy of `items` on every read.
    pub fn from_vec(name: impl Into<String>, items: Vec<T>) -> Self {
        let items = Arc::new(items);
        Self::from_fn(name, move || items.as_ref().clone())
    }

    /// A source backed by a reader function.
    pub fn from_fn(
        name: impl Into<String>,
        read: impl Fn() -> Vec<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            read: Arc::new(read),
        }
    }

    /// Source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_transform(self) -> Transform {
        let reader = Reader { read: self.read };
        Transform::new(TransformKind::Source, self.name, Body::Source(Arc::new(reader)))
    }
}

impl<T> fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("element", &std::any::type_name::<T>())
            .finish()
    }
}

struct Reader<T> {
    read: ReadFn<T>,
}

impl<T: Element> SourceReader for Reader<T> {
    fn read(&self) -> Batch {
        Batch::from_vec((self.read)())
    }
}

/// A named consumer of elements.
pub struct Sink<T> {
    name: String,
    write: WriteFn<T>,
}

impl<T: Element> Sink<T> {
    /// A sink backed by a writer function, called once per execution with
    /// every element that reached it.
    pub fn from_fn(
        name: impl Into<String>,
        write: impl Fn(&[T]) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            write: Arc::new(write),
        }
    }

    /// A sink that appends into an in-memory list, plus a handle to read it.
    pub fn collect(name: impl Into<String>) -> (Self, CollectedItems<T>) {
        let collected = CollectedItems::new();
        let target = collected.clone();
        let sink = Self::from_fn(name, move |items: &[T]| target.extend(items));
        (sink, collected)
    }

    /// Sink name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_transform(self) -> Transform {
        let writer = Writer { write: self.write };
        Transform::new(TransformKind::Sink, self.name, Body::Sink(Arc::new(writer)))
    }
}

impl<T> fmt::Debug for Sink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("name", &self.name)
            .field("element", &std::any::type_name::<T>())
            .finish()
    }
}

struct Writer<T> {
    write: WriteFn<T>,
}

impl<T: Element> SinkWriter for Writer<T> {
    fn write(&self, node: &str, input: &Partition) -> Result<usize, ExecutionError> {
        let items = elements::<T>(node, input)?;
        (self.write)(items);
        Ok(items.len())
    }
}

/// Shared handle to the items written by a [`Sink::collect`] sink.
pub struct CollectedItems<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T: Element> CollectedItems<T> {
    fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn extend(&self, items: &[T]) {
        self.items.lock().extend_from_slice(items);
    }

    /// Copy of everything collected so far.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }

    /// Removes and returns everything collected so far.
    #[must_use]
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }

    /// Number of collected items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Clone for CollectedItems<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CollectedItems<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.lock().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_reads_copy_each_time() {
        let source = Source::from_vec("numbers", vec![1_u8, 2, 3]);
        assert_eq!(source.name(), "numbers");
        let transform = source.into_transform();
        assert_eq!(transform.kind(), TransformKind::Source);

        let Body::Source(reader) = transform.body() else {
            panic!("expected source body");
        };
        for _ in 0..2 {
            let batch = reader.read();
            assert_eq!(batch.len, 3);
            assert_eq!(elements::<u8>("numbers", &batch.data).unwrap(), &[1, 2, 3]);
        }
    }

    #[test]
    fn test_collect_sink_accumulates_across_writes() {
        let (sink, collected) = Sink::<String>::collect("out");
        let transform = sink.into_transform();
        let Body::Sink(writer) = transform.body() else {
            panic!("expected sink body");
        };

        let first: Partition = Arc::new(vec!["a".to_string()]);
        let second: Partition = Arc::new(vec!["b".to_string(), "c".to_string()]);
        assert_eq!(writer.write("out", &first).unwrap(), 1);
        assert_eq!(writer.write("out", &second).unwrap(), 2);

        assert_eq!(collected.len(), 3);
        assert_eq!(collected.take(), vec!["a", "b", "c"]);
        assert!(collected.is_empty());
    }

    #[test]
    fn test_sink_rejects_wrong_partition_type() {
        let (sink, _) = Sink::<String>::collect("out");
        let transform = sink.into_transform();
        let Body::Sink(writer) = transform.body() else {
            panic!("expected sink body");
        };
        let wrong: Partition = Arc::new(vec![1_i32]);
        assert!(matches!(
            writer.write("out", &wrong),
            Err(ExecutionError::PartitionTypeMismatch { .. })
        ));
    }
}
