//! Integration tests for the vtry-internals crate: instance allocation,
//! prefix views and disposal through the vtable.

use std::sync::atomic::{AtomicUsize, Ordering};

use vtry_internals::{InstanceVtable, RawInstance};

static DROPS: AtomicUsize = AtomicUsize::new(0);

struct Counted;

impl Drop for Counted {
    fn drop(&mut self) {
        DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

#[repr(C)]
struct Header {
    tag: u32,
}

#[repr(C)]
struct Derived {
    header: Header,
    name: String,
    counted: Counted,
}

static_assertions::assert_impl_all!(RawInstance: Send);
static_assertions::assert_not_impl_any!(RawInstance: Sync, Clone);

#[test]
fn test_dispose_through_prefix_pointer() {
    let before = DROPS.load(Ordering::SeqCst);
    let vtable = InstanceVtable::new::<Derived>();
    let raw = RawInstance::allocate_zeroed(vtable).unwrap();

    // SAFETY: The block is sized and aligned for a `Derived`.
    unsafe {
        raw.as_ptr::<Derived>().write(Derived {
            header: Header { tag: 7 },
            name: String::from("orange"),
            counted: Counted,
        });
    }

    let header = raw.into_raw::<Header>();
    // SAFETY: `Derived` is `repr(C)` and starts with a `Header`.
    assert_eq!(unsafe { header.as_ref() }.tag, 7);

    // SAFETY: `header` came from `into_raw` with the same vtable.
    let raw = unsafe { RawInstance::from_raw_parts(header, vtable) };
    assert_eq!(raw.vtable().layout().size(), size_of::<Derived>());
    // SAFETY: The block holds an initialized `Derived`, unused afterwards.
    unsafe { raw.dispose() };
    assert_eq!(DROPS.load(Ordering::SeqCst), before + 1);
}

#[test]
fn test_deallocate_skips_drop_glue() {
    let before = DROPS.load(Ordering::SeqCst);
    let raw = RawInstance::allocate_zeroed(InstanceVtable::new::<Counted>()).unwrap();
    // SAFETY: Nothing derived from the block is used afterwards.
    unsafe { raw.deallocate() };
    assert_eq!(DROPS.load(Ordering::SeqCst), before);
}

#[test]
fn test_zeroed_header() {
    let raw = RawInstance::allocate_zeroed(InstanceVtable::new::<Header>()).unwrap();
    // SAFETY: An all-zero `Header` is valid.
    assert_eq!(unsafe { raw.as_ptr::<Header>().as_ref() }.tag, 0);
    // SAFETY: Nothing derived from the block is used afterwards.
    unsafe { raw.dispose() };
}

#[test]
fn test_vtable_debug() {
    let rendered = format!("{:?}", InstanceVtable::new::<Derived>());
    assert!(rendered.contains("Derived"));
}
