use multi_clipboards::error::HotKeyError;
use multi_clipboards::global_hotkey::{HotKeyRegistrar, MockHotKeyBackend, MOD_NOREPEAT};
use multi_clipboards::hotkey::{HotKey, HotKeyOperation, ModifierKeys};

fn slot_keys(slot: i32, modifiers: ModifierKeys) -> Vec<HotKey> {
    vec![
        HotKey::new(slot, HotKeyOperation::Cut, modifiers, 0x58),
        HotKey::new(slot, HotKeyOperation::Copy, modifiers, 0x43),
        HotKey::new(slot, HotKeyOperation::Paste, modifiers, 0x56),
    ]
}

#[test]
fn register_binds_with_os() {
    let (backend, handle) = MockHotKeyBackend::new();
    let mut registrar = HotKeyRegistrar::new(Box::new(backend));
    for hk in slot_keys(1, ModifierKeys::CONTROL | ModifierKeys::ALT) {
        registrar.register(hk).unwrap();
    }
    let registered = handle.registered();
    assert_eq!(registered.len(), 3);
    assert!(registered.iter().all(|(_, mods, _)| *mods == 0x0003));
    assert!(registrar.hot_keys().iter().all(|hk| hk.registration_id.is_some()));
}

#[test]
fn no_repeat_flag_is_added_when_supported() {
    let (backend, handle) = MockHotKeyBackend::new();
    let mut registrar = HotKeyRegistrar::new(Box::new(backend.with_no_repeat()));
    registrar
        .register(HotKey::new(1, HotKeyOperation::Copy, ModifierKeys::WINDOWS, 0x43))
        .unwrap();
    assert_eq!(handle.registered()[0].1, 0x0008 | MOD_NOREPEAT);
}

#[test]
fn failed_registration_releases_id_and_continues() {
    let (backend, handle) = MockHotKeyBackend::new();
    handle.refuse_key(0x43);
    let mut registrar = HotKeyRegistrar::new(Box::new(backend));

    let mut results = Vec::new();
    for hk in slot_keys(1, ModifierKeys::CONTROL) {
        results.push(registrar.register(hk));
    }
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(HotKeyError::Registration { .. })));
    assert!(results[2].is_ok());
    assert_eq!(registrar.hot_keys().len(), 2);
    assert_eq!(handle.allocated().len(), 2);
}

#[test]
fn id_allocation_failure_is_reported() {
    let (backend, handle) = MockHotKeyBackend::new();
    handle.refuse_id_allocation(true);
    let mut registrar = HotKeyRegistrar::new(Box::new(backend));
    let err = registrar
        .register(HotKey::new(1, HotKeyOperation::Copy, ModifierKeys::CONTROL, 0x43))
        .unwrap_err();
    assert!(matches!(err, HotKeyError::IdAllocation(_)));
    assert!(handle.registered().is_empty());
}

#[test]
fn same_combination_cannot_be_bound_twice() {
    let (backend, _handle) = MockHotKeyBackend::new();
    let mut registrar = HotKeyRegistrar::new(Box::new(backend));
    registrar
        .register(HotKey::new(1, HotKeyOperation::Copy, ModifierKeys::CONTROL, 0x43))
        .unwrap();
    let err = registrar
        .register(HotKey::new(2, HotKeyOperation::Paste, ModifierKeys::CONTROL, 0x43))
        .unwrap_err();
    assert!(matches!(err, HotKeyError::AlreadyBound(_)));
}

#[test]
fn unregister_is_idempotent() {
    let (backend, handle) = MockHotKeyBackend::new();
    let mut registrar = HotKeyRegistrar::new(Box::new(backend));
    let hk = HotKey::new(1, HotKeyOperation::Copy, ModifierKeys::CONTROL, 0x43);
    registrar.register(hk.clone()).unwrap();

    registrar.unregister(&hk);
    registrar.unregister(&hk);
    assert!(registrar.hot_keys().is_empty());
    assert!(handle.registered().is_empty());
    assert!(handle.allocated().is_empty());
}

#[test]
fn removing_a_slot_leaves_other_bindings() {
    let (backend, handle) = MockHotKeyBackend::new();
    let mut registrar = HotKeyRegistrar::new(Box::new(backend));
    for hk in slot_keys(1, ModifierKeys::CONTROL | ModifierKeys::ALT) {
        registrar.register(hk).unwrap();
    }
    for hk in slot_keys(2, ModifierKeys::WINDOWS) {
        registrar.register(hk).unwrap();
    }

    let removed = registrar.unregister_slot(1);
    assert_eq!(removed.len(), 3);
    assert!(removed.iter().all(|hk| hk.clipboard_id == 1));
    assert_eq!(registrar.hot_keys().len(), 3);
    assert!(registrar.hot_keys().iter().all(|hk| hk.clipboard_id == 2));
    assert!(handle.registered().iter().all(|(_, mods, _)| *mods == 0x0008));
    assert_eq!(handle.allocated().len(), 3);
}

#[test]
fn observed_key_resolves_to_single_binding() {
    let (backend, _handle) = MockHotKeyBackend::new();
    let mut registrar = HotKeyRegistrar::new(Box::new(backend));
    for hk in slot_keys(5, ModifierKeys::WINDOWS) {
        registrar.register(hk).unwrap();
    }

    let observed = HotKey::observed(ModifierKeys::WINDOWS, 0x43);
    let found = registrar.find(&observed).unwrap();
    assert_eq!(found.clipboard_id, 5);
    assert_eq!(found.operation, HotKeyOperation::Copy);

    let unknown = HotKey::observed(ModifierKeys::SHIFT, 0x43);
    assert!(matches!(registrar.find(&unknown), Err(HotKeyError::NoMatch(_))));
}

#[test]
fn drop_unregisters_everything() {
    let (backend, handle) = MockHotKeyBackend::new();
    {
        let mut registrar = HotKeyRegistrar::new(Box::new(backend));
        for hk in slot_keys(1, ModifierKeys::CONTROL) {
            registrar.register(hk).unwrap();
        }
        assert_eq!(handle.registered().len(), 3);
    }
    assert!(handle.registered().is_empty());
    assert!(handle.allocated().is_empty());
}
