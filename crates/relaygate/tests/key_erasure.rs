//! Checks that key bytes never reach the allocator unerased.
//!
//! A counting global allocator scans every block freed on the test's own
//! thread for a marker pattern. Keys in these tests are built from that
//! pattern, so a nonzero count means key material was freed without being
//! zeroized first.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::{Arc, Weak};

use relaygate::{Router, RouterSettings};
use relaygate_auth::{AuthConfig, AuthenticatorManager, PrivateKey, SessionDelegate, UserList};
use relaygate_task::TaskRunner;
use relaygate_transport::memory::MemoryChannel;

// =========================================================================
// Scanning allocator
// =========================================================================

const MARKER: [u8; 4] = [201, 202, 203, 204];

thread_local! {
    static ARMED: Cell<bool> = const { Cell::new(false) };
    static LEAKS: Cell<usize> = const { Cell::new(0) };
}

struct ScanningAlloc;

// `realloc` keeps the default impl so that moved-from blocks go through
// `dealloc` and get scanned too.
unsafe impl GlobalAlloc for ScanningAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if ARMED.try_with(Cell::get).unwrap_or(false) {
            let block = unsafe { std::slice::from_raw_parts(ptr, layout.size()) };
            if block.windows(MARKER.len()).any(|w| w == MARKER) {
                let _ = LEAKS.try_with(|leaks| leaks.set(leaks.get() + 1));
            }
        }
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOC: ScanningAlloc = ScanningAlloc;

/// Runs `f` and returns how many freed blocks still held the marker.
fn marked_frees(f: impl FnOnce()) -> usize {
    LEAKS.with(|leaks| leaks.set(0));
    ARMED.with(|armed| armed.set(true));
    f();
    ARMED.with(|armed| armed.set(false));
    LEAKS.with(Cell::get)
}

/// `len` bytes of repeated marker.
fn marked_key_bytes(len: usize) -> Vec<u8> {
    MARKER.iter().copied().cycle().take(len).collect()
}

fn settings_json(key_len: usize) -> String {
    let key = marked_key_bytes(key_len);
    format!(r#"{{ "private_key": {} }}"#, serde_json::to_string(&key).unwrap())
}

fn manager() -> Arc<AuthenticatorManager<MemoryChannel>> {
    let delegate: Weak<dyn SessionDelegate<MemoryChannel>> = Weak::<Router<MemoryChannel>>::new();
    let (runner, _queue) = TaskRunner::new();
    AuthenticatorManager::new(runner, delegate, AuthConfig::default())
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn test_scanner_detects_unerased_buffer() {
    let plain = marked_key_bytes(32);

    let found = marked_frees(move || drop(plain));

    assert_eq!(found, 1);
}

#[test]
fn test_drop_private_key_leaves_no_key_bytes() {
    let key = PrivateKey::new(marked_key_bytes(32));

    assert_eq!(marked_frees(move || drop(key)), 0);
}

#[test]
fn test_from_json_parses_key_without_freeing_key_bytes() {
    let json = settings_json(32);

    let found = marked_frees(|| {
        let settings = RouterSettings::from_json(&json).unwrap();
        assert_eq!(settings.private_key.len(), 32);
        drop(settings);
    });

    assert_eq!(found, 0);
}

#[test]
fn test_from_json_long_key_grows_without_freeing_key_bytes() {
    let json = settings_json(200);
    let expected = marked_key_bytes(200);

    let found = marked_frees(|| {
        let settings = RouterSettings::from_json(&json).unwrap();
        assert!(settings.private_key.as_bytes() == &expected[..]);
        drop(settings);
    });

    assert_eq!(found, 0);
}

#[test]
fn test_set_private_key_replacement_erases_old_key() {
    let manager = manager();
    manager.configure(PrivateKey::new(marked_key_bytes(32)), Arc::new(UserList::new()));
    let replacement = PrivateKey::new(vec![9; 32]);

    let found = marked_frees(|| manager.set_private_key(replacement));

    assert_eq!(found, 0);
}

#[test]
fn test_drop_manager_erases_key() {
    let manager = manager();
    manager.configure(PrivateKey::new(marked_key_bytes(32)), Arc::new(UserList::new()));

    assert_eq!(marked_frees(move || drop(manager)), 0);
}
