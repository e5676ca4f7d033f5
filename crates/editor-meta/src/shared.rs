//! Shared, re-entrancy guarded document handle.
//!
//! Hosts that hand the document to its own observers (a gutter that reacts to a mark change
//! by moving another mark, say) share it through [`SharedDocument`]. While an operation is in
//! flight the document is mutably borrowed; a second mutating call issued from inside one of
//! its notifications gets [`MetaError::Busy`] instead of re-entering.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::block_selection::BlockSelection;
use crate::buffer::{LineId, TextBuffer};
use crate::document::{DocumentMetadata, MetadataChange};
use crate::error::MetaError;
use crate::marks::{GutterUpdate, Mark};

/// A reference-counted [`DocumentMetadata`].
pub struct SharedDocument<B: TextBuffer> {
    inner: Rc<RefCell<DocumentMetadata<B>>>,
}

impl<B: TextBuffer> Clone for SharedDocument<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// A non-owning [`SharedDocument`] handle, for capture inside callbacks.
pub struct WeakDocument<B: TextBuffer> {
    inner: Weak<RefCell<DocumentMetadata<B>>>,
}

impl<B: TextBuffer> Clone for WeakDocument<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<B: TextBuffer> WeakDocument<B> {
    /// The document, if it is still alive.
    pub fn upgrade(&self) -> Option<SharedDocument<B>> {
        self.inner.upgrade().map(|inner| SharedDocument { inner })
    }
}

impl<B: TextBuffer + 'static> SharedDocument<B> {
    /// Share `document`.
    pub fn new(document: DocumentMetadata<B>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(document)),
        }
    }

    /// A weak handle that does not keep the document alive.
    pub fn downgrade(&self) -> WeakDocument<B> {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Read the document.
    ///
    /// Fails with [`MetaError::Busy`] while a mutating operation is in flight.
    pub fn read<R>(&self, f: impl FnOnce(&DocumentMetadata<B>) -> R) -> Result<R, MetaError> {
        let doc = self.inner.try_borrow().map_err(|_| MetaError::Busy)?;
        Ok(f(&doc))
    }

    /// Run a mutating operation.
    ///
    /// Fails with [`MetaError::Busy`] if another operation is in flight.
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut DocumentMetadata<B>) -> R,
    ) -> Result<R, MetaError> {
        let mut doc = self.inner.try_borrow_mut().map_err(|_| {
            tracing::warn!("Rejected re-entrant document operation");
            MetaError::Busy
        })?;
        Ok(f(&mut doc))
    }

    /// See [`DocumentMetadata::subscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Result<(), MetaError>
    where
        F: FnMut(&MetadataChange) + 'static,
    {
        self.update(|doc| doc.subscribe(callback))
    }

    /// See [`DocumentMetadata::add_mark`].
    pub fn add_mark(&self, line: LineId, mark: &Rc<Mark>) -> Result<GutterUpdate, MetaError> {
        self.update(|doc| doc.add_mark(line, mark))?
    }

    /// See [`DocumentMetadata::remove_mark`].
    pub fn remove_mark(&self, line: LineId, mark: &Mark) -> Result<GutterUpdate, MetaError> {
        self.update(|doc| doc.remove_mark(line, mark))?
    }

    /// See [`DocumentMetadata::move_mark`].
    pub fn move_mark(
        &self,
        mark: &Mark,
        from: LineId,
        to: LineId,
    ) -> Result<GutterUpdate, MetaError> {
        self.update(|doc| doc.move_mark(mark, from, to))?
    }

    /// See [`DocumentMetadata::toggle_fold`].
    pub fn toggle_fold(&self, line: LineId, unfold: bool) -> Result<usize, MetaError> {
        self.update(|doc| doc.toggle_fold(line, unfold))
    }

    /// See [`DocumentMetadata::on_save`].
    pub fn on_save(&self) -> Result<i32, MetaError> {
        self.update(DocumentMetadata::on_save)
    }

    /// Replace the block selection and insert `text` into it.
    pub fn block_insert_text(
        &self,
        selection: BlockSelection,
        text: &str,
    ) -> Result<Vec<LineId>, MetaError> {
        self.update(|doc| {
            doc.block_selection_mut().set_selection(selection);
            doc.block_insert_text(text)
        })
    }
}
