use num_enum::TryFromPrimitive;

/// Block ids of the LLVM IR schema. Ids below 8 belong to the container.
#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy, TryFromPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum BlockId {
    Module = 8,
    ParamAttr,
    ParamAttrGroup,
    Constants,
    Function,
    /// Producer string and epoch, ahead of the module block.
    Identification,
    ValueSymtab,
    Metadata,
    MetadataAttachment,
    Type = 17,
    Uselist,
    ModuleStrtab,
    GlobalvalSummary,
    OperandBundleTags,
    MetadataKind,
    Strtab,
    FullLtoGlobalvalSummary,
    Symtab,
    SyncScopeNames,
}

impl BlockId {
    #[must_use]
    pub fn from_id(id: u64) -> Option<Self> {
        u8::try_from(id).ok().and_then(|id| Self::try_from(id).ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum IdentificationCode {
    /// [strchr x N]
    String = 1,
    /// [epoch#]
    Epoch = 2,
}

/// Records of the `MODULE` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum ModuleCode {
    /// [version#]
    Version = 1,
    /// [strchr x N]
    Triple = 2,
    /// [strchr x N]
    Datalayout = 3,
    /// [strchr x N]
    Asm = 4,
    /// [strchr x N]
    SectionName = 5,
    /// [strchr x N]
    Deplib = 6,
    /// [strtab offset, strtab size, type, flags, initid, linkage, alignment,
    ///  section, visibility, threadlocal, unnamed_addr, externally_initialized,
    ///  dllstorageclass, comdat, attributes, dso_local]
    GlobalVar = 7,
    /// [strtab offset, strtab size, type, callingconv, isproto, linkage,
    ///  paramattr, alignment, section, visibility, gc, unnamed_addr,
    ///  prologuedata, dllstorageclass, comdat, prefixdata, personalityfn,
    ///  dso_local, addrspace]
    Function = 8,
    /// [alias type, aliasee val#, linkage, visibility]
    AliasOld = 9,
    /// [strchr x N]
    GCName = 11,
    /// [selection_kind, name]
    Comdat = 12,
    /// [offset]
    VstOffset = 13,
    /// [strtab offset, strtab size, alias value type, addrspace, aliasee val#,
    ///  linkage, visibility, dllstorageclass, threadlocal, unnamed_addr, dso_local]
    Alias = 14,
    MetadataValuesUnused = 15,
    /// [namechar x N]
    SourceFilename = 16,
    /// [5*i32]
    Hash = 17,
    /// [strtab offset, strtab size, ifunc value type, addrspace, resolver val#,
    ///  linkage, visibility]
    Ifunc = 18,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum StrtabCode {
    /// [blob]
    Blob = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ValueSymtabCode {
    /// [valueid, namechar x N]
    Entry = 1,
    /// [bbid, namechar x N]
    BbEntry = 2,
    /// [valueid, offset, namechar x N]
    FnEntry = 3,
    /// [valueid, refguid]
    CombinedEntry = 5,
}

/// Records of the `PARAMATTR` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum AttributeCode {
    /// [paramidx0, attr0, paramidx1, attr1...], long obsolete
    EntryOld = 1,
    /// [attrgrp0, attrgrp1, ...]
    Entry = 2,
}

/// Records of the `PARAMATTR_GROUP` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum AttributeGroupCode {
    /// [grpid, paramidx, attr...]
    Entry = 3,
}

/// Tag in front of each attribute inside a group entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum AttributeEncoding {
    /// [kind]
    Enum = 0,
    /// [kind, value]
    Int = 1,
    /// [keychar x N, 0]
    String = 3,
    /// [keychar x N, 0, valuechar x N, 0]
    StringWithValue = 4,
    /// [kind]
    Type = 5,
    /// [kind, typeid]
    TypeWithId = 6,
    /// [kind, bitwidth, lower, upper]
    ConstantRange = 7,
    /// [kind, count, bitwidth, (lower, upper) x count]
    ConstantRangeList = 8,
}

/// Records of the `TYPE_BLOCK_ID_NEW` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum TypeCode {
    /// [numentries]
    NumEntry = 1,
    Void = 2,
    Float = 3,
    Double = 4,
    Label = 5,
    /// Named opaque struct; takes the preceding STRUCT_NAME.
    Opaque = 6,
    /// [width]
    Integer = 7,
    /// [pointee type, address space]
    Pointer = 8,
    /// [vararg, attrid, retty, paramty x N]
    FunctionOld = 9,
    Half = 10,
    /// [numelts, eltty]
    Array = 11,
    /// [numelts, eltty, scalable?]
    Vector = 12,
    X86Fp80 = 13,
    Fp128 = 14,
    PpcFp128 = 15,
    Metadata = 16,
    X86Mmx = 17,
    /// [ispacked, eltty x N]
    StructAnon = 18,
    /// [strchr x N]
    StructName = 19,
    /// [ispacked, eltty x N]
    StructNamed = 20,
    /// [vararg, retty, paramty x N]
    Function = 21,
    Token = 22,
    BFloat = 23,
    X86Amx = 24,
    /// [address space]
    OpaquePointer = 25,
    /// [numtys, ty x numtys, int x N]
    TargetType = 26,
}

/// Records of the `CONSTANTS` block. Each one except `SetType` defines the
/// next value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum ConstantsCode {
    /// [typeid]
    SetType = 1,
    Null = 2,
    Undef = 3,
    /// [signed value]
    Integer = 4,
    /// [n x signed words]
    WideInteger = 5,
    /// [fpval]
    Float = 6,
    /// [n x value number]
    Aggregate = 7,
    /// [values]
    String = 8,
    /// [values], implicit trailing zero
    CString = 9,
    /// [opcode, opval, opval, flags?]
    BinOp = 10,
    /// [opcode, opty, opval]
    Cast = 11,
    /// [n x operands]
    GepOld = 12,
    /// [opval, opval, opval]
    Select = 13,
    ExtractElt = 14,
    InsertElt = 15,
    ShuffleVec = 16,
    /// [opty, opval, opval, pred]
    Cmp = 17,
    InlineAsmOld = 18,
    ShufVecEx = 19,
    /// [n x operands]
    InboundsGep = 20,
    /// [fnty, fnval, bb#]
    BlockAddress = 21,
    /// [n x elements]
    Data = 22,
    InlineAsmOld2 = 23,
    GepWithInrangeIndexOld = 24,
    UnOp = 25,
    Poison = 26,
    DsoLocalEquivalent = 27,
    InlineAsmOld3 = 28,
    NoCfiValue = 29,
    InlineAsm = 30,
    GepWithInrange = 31,
    /// [pointee type, flags, n x (type, value)]
    Gep = 32,
    PtrAuth = 33,
}

/// Records of the `METADATA` and `METADATA_KIND` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum MetadataCode {
    /// [values]
    StringOld = 1,
    /// [ty, val]
    Value = 2,
    /// [n x md num]
    Node = 3,
    /// [values]
    Name = 4,
    /// [n x md num]
    DistinctNode = 5,
    /// [n x [id, name]]
    Kind = 6,
    /// [distinct, line, col, scope, inlined-at?, implicit?]
    Location = 7,
    OldNode = 8,
    OldFnNode = 9,
    /// [n x mdnodes]
    NamedNode = 10,
    Attachment = 11,
    GenericDebug = 12,
    Subrange = 13,
    Enumerator = 14,
    BasicType = 15,
    File = 16,
    DerivedType = 17,
    CompositeType = 18,
    SubroutineType = 19,
    CompileUnit = 20,
    Subprogram = 21,
    LexicalBlock = 22,
    LexicalBlockFile = 23,
    Namespace = 24,
    TemplateType = 25,
    TemplateValue = 26,
    GlobalVar = 27,
    LocalVar = 28,
    /// [distinct | version << 1, n x element]
    Expression = 29,
    ObjcProperty = 30,
    ImportedEntity = 31,
    Module = 32,
    Macro = 33,
    MacroFile = 34,
    /// [count, offset] blob([lengths][chars])
    Strings = 35,
    /// [valueid, n x [id, mdnode]]
    GlobalDeclAttachment = 36,
    /// [distinct, var, expr]
    GlobalVarExpr = 37,
    IndexOffset = 38,
    Index = 39,
    Label = 40,
    StringType = 41,
    CommonBlock = 44,
    GenericSubrange = 45,
    ArgList = 46,
    AssignId = 47,
}
