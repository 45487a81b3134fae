use multi_clipboards::hotkey::{
    key_name, parse_hotkey, virtual_key_from_string, HotKey, HotKeyOperation, ModifierKeys,
};
use std::collections::HashSet;

#[test]
fn parse_combo_hotkey() {
    let (mods, key) = parse_hotkey("Ctrl+Shift+C").expect("should parse combination");
    assert_eq!(mods, ModifierKeys::CONTROL | ModifierKeys::SHIFT);
    assert_eq!(key, 0x43);
}

#[test]
fn parse_function_and_named_keys() {
    assert_eq!(parse_hotkey("F2"), Some((ModifierKeys::NONE, 0x71)));
    assert_eq!(parse_hotkey("win+numpad1"), Some((ModifierKeys::WINDOWS, 0x61)));
    assert_eq!(virtual_key_from_string("Esc"), Some(0x1B));
    assert_eq!(virtual_key_from_string("F25"), None);
}

#[test]
fn parse_invalid_hotkey() {
    assert!(parse_hotkey("Ctrl+Foo").is_none());
    assert!(parse_hotkey("Ctrl+Shift").is_none());
    assert!(parse_hotkey("Ctrl+A+B").is_none());
}

#[test]
fn equality_ignores_slot_and_operation() {
    let copy = HotKey::new(1, HotKeyOperation::Copy, ModifierKeys::CONTROL, 0x43);
    let paste = HotKey::new(2, HotKeyOperation::Paste, ModifierKeys::CONTROL, 0x43);
    let shifted = HotKey::new(
        1,
        HotKeyOperation::Copy,
        ModifierKeys::CONTROL | ModifierKeys::SHIFT,
        0x43,
    );
    assert_eq!(copy, paste);
    assert_ne!(copy, shifted);

    let set: HashSet<HotKey> = [copy, paste, shifted].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn hotkey_message_lparam_is_decoded() {
    // MOD_WIN in the low word, 'C' in the high word.
    let lparam = (0x43isize << 16) | 0x0008;
    let observed = HotKey::from_lparam(lparam);
    assert_eq!(observed.modifiers, ModifierKeys::WINDOWS);
    assert_eq!(observed.key, 0x43);
}

#[test]
fn no_repeat_bit_is_not_a_modifier() {
    assert_eq!(ModifierKeys::from_bits(0x4000 | 0x0002), ModifierKeys::CONTROL);
}

#[test]
fn display_round_trips_through_parse() {
    let hk = HotKey::new(3, HotKeyOperation::Cut, ModifierKeys::CONTROL | ModifierKeys::ALT, 0x58);
    assert_eq!(hk.to_string(), "Ctrl+Alt+X");
    assert_eq!(parse_hotkey(&hk.to_string()), Some((hk.modifiers, hk.key)));
    assert_eq!(key_name(0x75), "F6");
    assert_eq!(hk.atom_name(), "MultipleClipboards:Ctrl+Alt+X");
}

#[test]
fn modifier_list_parsing() {
    assert_eq!(
        ModifierKeys::parse("Ctrl + Alt"),
        Some(ModifierKeys::CONTROL | ModifierKeys::ALT)
    );
    assert_eq!(ModifierKeys::parse(""), Some(ModifierKeys::NONE));
    assert_eq!(ModifierKeys::parse("Ctrl+Q"), None);
}
