use num_enum::TryFromPrimitive;

/// Attribute kind ids used by enum, int and type attributes in a
/// `PARAMATTR_GROUP` entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum AttrKind {
    // = 0 is unused
    Alignment = 1,
    AlwaysInline = 2,
    ByVal = 3,
    InlineHint = 4,
    InReg = 5,
    MinSize = 6,
    Naked = 7,
    Nest = 8,
    NoAlias = 9,
    NoBuiltin = 10,
    NoCapture = 11,
    NoDuplicate = 12,
    NoImplicitFloat = 13,
    NoInline = 14,
    NonLazyBind = 15,
    NoRedZone = 16,
    NoReturn = 17,
    NoUnwind = 18,
    OptimizeForSize = 19,
    ReadNone = 20,
    ReadOnly = 21,
    Returned = 22,
    ReturnsTwice = 23,
    SExt = 24,
    StackAlignment = 25,
    StackProtect = 26,
    StackProtectReq = 27,
    StackProtectStrong = 28,
    StructRet = 29,
    SanitizeAddress = 30,
    SanitizeThread = 31,
    SanitizeMemory = 32,
    UwTable = 33,
    ZExt = 34,
    Builtin = 35,
    Cold = 36,
    OptimizeNone = 37,
    InAlloca = 38,
    NonNull = 39,
    JumpTable = 40,
    Dereferenceable = 41,
    DereferenceableOrNull = 42,
    Convergent = 43,
    Safestack = 44,
    /// Unused
    ArgMemOnly = 45,
    SwiftSelf = 46,
    SwiftError = 47,
    NoRecurse = 48,
    /// Unused
    InaccessibleMemOnly = 49,
    /// Unused
    InaccessiblememOrArgMemOnly = 50,
    AllocSize = 51,
    Writeonly = 52,
    Speculatable = 53,
    StrictFp = 54,
    SanitizeHwaddress = 55,
    NocfCheck = 56,
    OptForFuzzing = 57,
    Shadowcallstack = 58,
    SpeculativeLoadHardening = 59,
    Immarg = 60,
    Willreturn = 61,
    Nofree = 62,
    Nosync = 63,
    SanitizeMemtag = 64,
    Preallocated = 65,
    NoMerge = 66,
    NullPointerIsValid = 67,
    Noundef = 68,
    Byref = 69,
    Mustprogress = 70,
    NoCallback = 71,
    Hot = 72,
    NoProfile = 73,
    VscaleRange = 74,
    SwiftAsync = 75,
    NoSanitizeCoverage = 76,
    Elementtype = 77,
    DisableSanitizerInstrumentation = 78,
    NoSanitizeBounds = 79,
    AllocAlign = 80,
    AllocatedPointer = 81,
    AllocKind = 82,
    PresplitCoroutine = 83,
    FnretthunkExtern = 84,
    SkipProfile = 85,
    Memory = 86,
    Nofpclass = 87,
    OptimizeForDebugging = 88,
    Writable = 89,
    CoroOnlyDestroyWhenComplete = 90,
    DeadOnUnwind = 91,
    Range = 92,
    SanitizeNumericalStability = 93,
    Initializes = 94,
    HybridPatchable = 95,
}

/// Cast operators of a `CE_CAST` constant expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum CastOpcode {
    Trunc = 0,
    ZExt = 1,
    SExt = 2,
    FpToUi = 3,
    FpToSi = 4,
    UiToFp = 5,
    SiToFp = 6,
    FpTrunc = 7,
    FpExt = 8,
    PtrToInt = 9,
    IntToPtr = 10,
    Bitcast = 11,
    AddrSpaceCast = 12,
}

/// Binary operators of a `CE_BINOP` constant expression. The division and
/// remainder codes double as their floating point counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum BinOpcode {
    Add = 0,
    Sub = 1,
    Mul = 2,
    UDiv = 3,
    SDiv = 4,
    URem = 5,
    SRem = 6,
    Shl = 7,
    LShr = 8,
    AShr = 9,
    And = 10,
    Or = 11,
    Xor = 12,
}

impl BinOpcode {
    /// Opcodes whose flag operand carries no-wrap bits.
    #[must_use]
    pub fn is_overflowing(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Shl)
    }

    /// Opcodes whose flag operand carries the exact bit.
    #[must_use]
    pub fn is_exact_capable(self) -> bool {
        matches!(self, Self::UDiv | Self::SDiv | Self::LShr | Self::AShr)
    }
}

/// Linkage of a global value, after folding the obsolete encodings onto
/// their modern equivalents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Linkage {
    #[default]
    External,
    AvailableExternally,
    LinkOnceAny,
    LinkOnceOdr,
    WeakAny,
    WeakOdr,
    Appending,
    Internal,
    Private,
    ExternalWeak,
    Common,
}

impl Linkage {
    /// Decodes the linkage operand of `GLOBALVAR`, `FUNCTION` and alias
    /// records. Unknown values read as external.
    #[must_use]
    pub fn decode(value: u64) -> Self {
        match value {
            2 => Self::Appending,
            3 => Self::Internal,
            7 => Self::ExternalWeak,
            8 => Self::Common,
            9 | 13 | 14 => Self::Private,
            12 => Self::AvailableExternally,
            1 | 16 => Self::WeakAny,
            10 | 17 => Self::WeakOdr,
            4 | 18 => Self::LinkOnceAny,
            11 | 19 => Self::LinkOnceOdr,
            // 5 and 6 were dllimport/dllexport, 15 linkonce_odr_autohide
            _ => Self::External,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive)]
#[repr(u8)]
pub enum Visibility {
    #[default]
    Default = 0,
    Hidden = 1,
    Protected = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive)]
#[repr(u8)]
pub enum DllStorageClass {
    #[default]
    Default = 0,
    Import = 1,
    Export = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive)]
#[repr(u8)]
pub enum UnnamedAddr {
    #[default]
    None = 0,
    Global = 1,
    Local = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive)]
#[repr(u8)]
pub enum ThreadLocalMode {
    #[default]
    NotThreadLocal = 0,
    GeneralDynamic = 1,
    LocalDynamic = 2,
    InitialExec = 3,
    LocalExec = 4,
}

/// Decodes a small enum operand, falling back to the default variant for
/// values this crate does not know.
pub(crate) fn decode_or_default<T>(value: u64) -> T
where
    T: TryFromPrimitive<Primitive = u8> + Default,
{
    u8::try_from(value)
        .ok()
        .and_then(|v| T::try_from_primitive(v).ok())
        .unwrap_or_default()
}
