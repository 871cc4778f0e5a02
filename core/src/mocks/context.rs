//! Context, PackageManager, and Signature hooks.

use crate::interp::Interp;
use crate::mocks::dispatch::HookResult;
use crate::mocks::factories::{
    create_mock_list, create_mock_package_info, create_mock_package_manager,
};
use crate::value::{DvArray, Internal, Value};

/// `Context.getPackageManager() -> PackageManager`
pub(crate) fn context_get_package_manager(
    _it: &mut Interp<'_>,
    _args: &[Value],
    _trace: &str,
) -> HookResult {
    HookResult::Value(Value::Object(create_mock_package_manager()))
}

/// `Context.getPackageName() -> String`
pub(crate) fn context_get_package_name(
    it: &mut Interp<'_>,
    _args: &[Value],
    _trace: &str,
) -> HookResult {
    HookResult::Value(Value::string(it.ctx.mocks.package_name.clone()))
}

/// `PackageManager.getPackageInfo(String, int) -> PackageInfo`
pub(crate) fn pm_get_package_info(
    it: &mut Interp<'_>,
    args: &[Value],
    _trace: &str,
) -> HookResult {
    let package_name = args.get(1).and_then(Value::text);
    HookResult::Value(Value::Object(create_mock_package_info(
        &it.ctx.mocks,
        package_name,
    )))
}

/// `PackageManager.getInstalledPackages(int) -> List<PackageInfo>`
pub(crate) fn pm_get_installed_packages(
    it: &mut Interp<'_>,
    _args: &[Value],
    _trace: &str,
) -> HookResult {
    let info = Value::Object(create_mock_package_info(&it.ctx.mocks, None));
    HookResult::Value(Value::Object(create_mock_list(vec![info])))
}

fn signature_bytes(it: &Interp<'_>, args: &[Value]) -> Vec<u8> {
    let from_receiver = args.first().and_then(Value::as_object).and_then(|obj| {
        match &obj.borrow().internal {
            Some(Internal::Bytes(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    });
    from_receiver.unwrap_or_else(|| it.ctx.mocks.signature_bytes.clone())
}

/// `Signature.toByteArray() -> byte[]`
pub(crate) fn signature_to_byte_array(
    it: &mut Interp<'_>,
    args: &[Value],
    _trace: &str,
) -> HookResult {
    let bytes = signature_bytes(it, args);
    let data = bytes.iter().map(|&b| Value::Int(b as i32)).collect();
    HookResult::Value(Value::array(DvArray::from_values("[B", data)))
}

/// `Signature.toCharsString() -> String`
pub(crate) fn signature_to_chars_string(
    it: &mut Interp<'_>,
    args: &[Value],
    _trace: &str,
) -> HookResult {
    let bytes = signature_bytes(it, args);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    HookResult::Value(Value::string(hex))
}

/// `Signature.hashCode() -> int`
///
/// Arrays.hashCode over the raw certificate bytes, masked positive the way
/// the original analyzer reported it.
pub(crate) fn signature_hash_code(
    it: &mut Interp<'_>,
    args: &[Value],
    _trace: &str,
) -> HookResult {
    let bytes = signature_bytes(it, args);
    let mut hash = 1i32;
    for &b in &bytes {
        hash = hash.wrapping_mul(31).wrapping_add(b as i8 as i32);
    }
    HookResult::Value(Value::Int(hash & 0x7FFF_FFFF))
}
