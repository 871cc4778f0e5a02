//! Tunable mock values.
//!
//! Adjust these to match the target app's environment: checks against the
//! package name or signing certificate only pass when the mocked values
//! agree with what the app expects.

/// `PackageManager.GET_SIGNATURES`
pub const GET_SIGNATURES: i32 = 0x0000_0040;

/// `PackageManager.GET_SIGNING_CERTIFICATES`
pub const GET_SIGNING_CERTIFICATES: i32 = 0x0800_0000;

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Package name returned by `Context.getPackageName()`
    pub package_name: String,

    /// Raw signing-certificate bytes behind `Signature.toByteArray()`
    pub signature_bytes: Vec<u8>,

    /// SDK version for `Build.VERSION.SDK_INT`
    pub sdk_int: i32,

    /// `PackageInfo.versionCode`
    pub version_code: i32,

    /// `PackageInfo.versionName`
    pub version_name: String,
}

impl Default for MockConfig {
    fn default() -> MockConfig {
        MockConfig {
            package_name: "com.example.app".to_string(),
            signature_bytes: [0xAB, 0xCD].repeat(128),
            sdk_int: 30,
            version_code: 1,
            version_name: "1.0".to_string(),
        }
    }
}
