//! Reference-counted handles to natively owned objects held by a host runtime.
//!
//! A [`ForeignHandle`] is an `Arc` around a slot holding the raw object
//! pointer, its class id and an optional destructor. Cloning bumps the shared
//! count and the destructor runs from the slot's `Drop`, so it fires exactly
//! once no matter how clones and drops interleave across threads. Borrowed
//! handles carry no destructor.
//!
//! Access to the object itself is not synchronized here.

use std::any::TypeId;
use std::ffi::c_void;
use std::fmt;
use std::ptr;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Small integer naming a native class at the boundary. Zero is reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub u16);

impl ClassId {
    pub const NONE: ClassId = ClassId(0);

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A native type exposed to host languages under a fixed class id.
pub trait ForeignClass: Send + Sync + 'static {
    const CLASS_ID: ClassId;
    const CLASS_NAME: &'static str;
}

/// Releases a natively owned object.
pub type Destructor = unsafe fn(*mut c_void);

unsafe fn drop_boxed<T>(ptr: *mut c_void) {
    // SAFETY: only installed by `ForeignHandle::owning::<T>` for a pointer
    // produced by `Box::<T>::into_raw`.
    drop(unsafe { Box::from_raw(ptr as *mut T) });
}

struct Slot {
    ptr: *mut c_void,
    class_id: ClassId,
    /// Set by the typed constructors. Raw handles only carry the class id.
    type_id: Option<TypeId>,
    destructor: Option<Destructor>,
}

// SAFETY: typed constructors require `T: Send + Sync`; raw constructors put
// the same requirement on their callers.
unsafe impl Send for Slot {}
unsafe impl Sync for Slot {}

impl Drop for Slot {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        if let Some(destroy) = self.destructor.take() {
            tracing::trace!(target: "ferry::handle", class_id = self.class_id.0, "destroying native object");
            // SAFETY: the slot is dropped once, when the last handle goes away.
            unsafe { destroy(self.ptr) };
        }
        self.ptr = ptr::null_mut();
    }
}

#[derive(Clone)]
pub struct ForeignHandle {
    slot: Arc<Slot>,
}

impl ForeignHandle {
    /// Takes ownership of `obj`; it is dropped with the last handle.
    pub fn owning<T: ForeignClass>(obj: Box<T>) -> Self {
        let ptr = Box::into_raw(obj) as *mut c_void;
        Self::with_slot(ptr, T::CLASS_ID, Some(TypeId::of::<T>()), Some(drop_boxed::<T>))
    }

    /// Refers to an object whose lifetime is managed elsewhere.
    pub fn borrowed<T: ForeignClass>(obj: &'static T) -> Self {
        Self::with_slot(obj as *const T as *mut c_void, T::CLASS_ID, Some(TypeId::of::<T>()), None)
    }

    /// A handle that refers to nothing, e.g. a closed resource.
    pub fn null(class_id: ClassId) -> Self {
        Self::with_slot(ptr::null_mut(), class_id, None, None)
    }

    /// Wraps a raw pointer with ownership.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid until `destructor` is called with it, the object
    /// must be an instance of the class `class_id` stands for, and it must be
    /// safe to share and release from any thread.
    pub unsafe fn from_raw_owning(ptr: *mut c_void, destructor: Destructor, class_id: ClassId) -> Self {
        Self::with_slot(ptr, class_id, None, Some(destructor))
    }

    /// Wraps a raw pointer without ownership.
    ///
    /// # Safety
    ///
    /// `ptr` must outlive every clone of the returned handle, be an instance
    /// of the class `class_id` stands for, and be safe to share across threads.
    pub unsafe fn from_raw_borrowed(ptr: *mut c_void, class_id: ClassId) -> Self {
        Self::with_slot(ptr, class_id, None, None)
    }

    fn with_slot(
        ptr: *mut c_void,
        class_id: ClassId,
        type_id: Option<TypeId>,
        destructor: Option<Destructor>,
    ) -> Self {
        Self {
            slot: Arc::new(Slot {
                ptr,
                class_id,
                type_id,
                destructor,
            }),
        }
    }

    #[inline]
    pub fn class_id(&self) -> ClassId {
        self.slot.class_id
    }

    pub fn is_null(&self) -> bool {
        self.slot.ptr.is_null()
    }

    pub fn is_owning(&self) -> bool {
        self.slot.destructor.is_some()
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.slot)
    }

    pub fn ptr_eq(&self, other: &ForeignHandle) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.slot.ptr
    }

    pub(crate) fn addr(&self) -> usize {
        self.slot.ptr as usize
    }

    /// The object, if the handle was created for class `T`.
    ///
    /// A null handle yields `Ok(None)`; a handle of another class is a
    /// `TypeMismatch`. Handles built from a typed value must also match the
    /// Rust type, so two types sharing a class id cannot be confused.
    pub fn get<T: ForeignClass>(&self) -> Result<Option<&T>> {
        let same_type = self.slot.type_id.is_none_or(|t| t == TypeId::of::<T>());
        if self.slot.class_id != T::CLASS_ID || !same_type {
            return Err(Error::type_mismatch(T::CLASS_NAME, "object of another class"));
        }
        if self.slot.ptr.is_null() {
            return Ok(None);
        }
        // SAFETY: typed handles were checked against `T`'s `TypeId`; raw ones
        // rely on the constructor contract tying `class_id` to the object. The
        // slot keeps the object alive for as long as `self` is borrowed.
        Ok(Some(unsafe { &*(self.slot.ptr as *const T) }))
    }
}

/// Handles are equal when they refer to the same object of the same class.
impl PartialEq for ForeignHandle {
    fn eq(&self, other: &Self) -> bool {
        self.class_id() == other.class_id() && self.addr() == other.addr()
    }
}

impl Eq for ForeignHandle {}

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignHandle")
            .field("class_id", &self.slot.class_id.0)
            .field("ptr", &self.slot.ptr)
            .field("owning", &self.is_owning())
            .field("refs", &self.ref_count())
            .finish()
    }
}
