//! Accessibility trust via ApplicationServices

use std::ptr;

use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::string::CFString;

use crate::permission::PermissionSource;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
}

#[derive(Debug, Default)]
pub struct AccessibilityPermission;

impl PermissionSource for AccessibilityPermission {
    fn is_trusted(&self) -> bool {
        unsafe { AXIsProcessTrustedWithOptions(ptr::null()) }
    }

    fn prompt(&self) -> bool {
        let key = CFString::new("AXTrustedCheckOptionPrompt");
        let options = CFDictionary::from_CFType_pairs(&[(key, CFBoolean::true_value())]);
        unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) }
    }
}
