//! Reflection hooks: Class, Method, Field.
//!
//! Reflection handles carry only the requested name. `Method.invoke`
//! recognizes the package-info access patterns obfuscators reach through
//! reflection and delegates to the same factories the direct hooks use.

use std::cell::RefCell;
use std::rc::Rc;

use crate::interp::Interp;
use crate::mocks::dispatch::HookResult;
use crate::mocks::factories::{
    create_mock_context, create_mock_list, create_mock_package_info, create_mock_package_manager,
};
use crate::value::{HeapObject, Internal, MockKind, Value};

fn handle(class: &str, kind: MockKind, name: Option<String>) -> Value {
    let mut obj = HeapObject::new(class);
    obj.mock = Some(kind);
    if let Some(name) = name {
        obj.internal = Some(Internal::Name(name));
    }
    Value::Object(Rc::new(RefCell::new(obj)))
}

fn name_of(value: Option<&Value>) -> Option<String> {
    let obj = value?.as_object()?;
    let obj = obj.borrow();
    match &obj.internal {
        Some(Internal::Text(s)) | Some(Internal::Name(s)) => Some(s.clone()),
        _ => None,
    }
}

/// `Class.forName(String) -> Class<?>`
pub(crate) fn class_for_name(_it: &mut Interp<'_>, args: &[Value], _trace: &str) -> HookResult {
    HookResult::Value(handle(
        "Ljava/lang/Class;",
        MockKind::Class,
        name_of(args.first()),
    ))
}

/// `Class.getMethod(String, Class<?>...) -> Method`
pub(crate) fn class_get_method(_it: &mut Interp<'_>, args: &[Value], _trace: &str) -> HookResult {
    HookResult::Value(handle(
        "Ljava/lang/reflect/Method;",
        MockKind::Method,
        name_of(args.get(1)),
    ))
}

/// `Class.getField(String) -> Field`
pub(crate) fn class_get_field(_it: &mut Interp<'_>, args: &[Value], _trace: &str) -> HookResult {
    HookResult::Value(handle(
        "Ljava/lang/reflect/Field;",
        MockKind::Field,
        name_of(args.get(1)),
    ))
}

/// `Method.invoke(Object, Object...) -> Object`
pub(crate) fn method_invoke(it: &mut Interp<'_>, args: &[Value], _trace: &str) -> HookResult {
    let Some(method_name) = name_of(args.first()) else {
        return HookResult::Value(Value::Null);
    };

    match method_name.as_str() {
        "getPackageManager" => HookResult::Value(Value::Object(create_mock_package_manager())),
        "getPackageName" => HookResult::Value(Value::string(it.ctx.mocks.package_name.clone())),
        "getPackageInfo" => {
            // varargs arrive boxed in an Object[]
            let package_name = args
                .get(2)
                .and_then(Value::as_array)
                .and_then(|arr| arr.borrow().data.first().and_then(Value::text));
            HookResult::Value(Value::Object(create_mock_package_info(
                &it.ctx.mocks,
                package_name,
            )))
        }
        "getInstalledPackages" => {
            let info = Value::Object(create_mock_package_info(&it.ctx.mocks, None));
            HookResult::Value(Value::Object(create_mock_list(vec![info])))
        }
        "getApplicationContext" => HookResult::Value(Value::Object(create_mock_context())),
        "getApplicationInfo" => {
            let mut obj = HeapObject::new("Landroid/content/pm/ApplicationInfo;");
            obj.mock = Some(MockKind::ApplicationInfo);
            HookResult::Value(Value::Object(Rc::new(RefCell::new(obj))))
        }
        _ => HookResult::Value(Value::Null),
    }
}

/// `Field.get(Object) -> Object`
pub(crate) fn field_get(_it: &mut Interp<'_>, _args: &[Value], _trace: &str) -> HookResult {
    HookResult::Value(Value::Null)
}

/// `Throwable.getCause() -> Throwable`
pub(crate) fn throwable_get_cause(
    _it: &mut Interp<'_>,
    _args: &[Value],
    _trace: &str,
) -> HookResult {
    HookResult::Value(Value::Null)
}
