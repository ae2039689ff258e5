//! The "atb" attribute tree format: a recursive tagged-value tree used for everything from
//! material parameters to UI layout data.
//!
//! A 4-byte magic carries `'A'`, `'T'`, `'B'` in its low three bytes; the top byte is a format
//! revision this crate doesn't interpret but still retains (`format_revision`), since discarding
//! it would make a round-tripped tree unfaithful to its source bytes for no benefit.
//!
//! The top-level value is a synthetic root [`Object`] with `is_collection = true`. A collection is
//! `u16 count` entries, each `{defHash, nameLen, name, object-body, then either a nested
//! collection or a `u16` zero guard}` depending on whether `defHash` names a known collection
//! type. An object-body is a run of `{u8 valueType, u32 propNameHash, value}` records terminated
//! by a zero tag.
//!
//! [`Value::Link`] doesn't carry its target inline — it carries a `u16` index into a link table
//! that follows the whole tree on the wire. This mirrors the source's two-pass reader: the link
//! table can only be read once every collection has been consumed, so resolution is deferred until
//! [`AttributeTree::parse`] has walked the full root.

use crate::catalog::FileTypeDescriptor;
use crate::error::{Result, VfsError};
use crate::file::{File, FileKind};
use crate::path::Path;
use crate::stream::{ReadPrimitives, SharedStream, Stream};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::collections::HashSet;
use std::io::SeekFrom;
use std::sync::OnceLock;

pub const HEADER_MAGIC_LOW24: u32 = 0x0042_5441; // 'A' | 'T' << 8 | 'B' << 16

const LINK_INVALID_ID: u16 = 0xFFFF;

/// The tag byte preceding every value's payload. Gaps between the grouped ranges are deliberate:
/// this is the tag set the source's reader switches on, not a contiguous enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum ValueType {
    Invalid = 0,
    Int32 = 1,
    UInt32 = 2,
    Float = 3,
    Bool = 4,
    Vec3 = 5,
    Vec2 = 6,
    Mat4 = 7,
    AString = 8,
    UInt64 = 9,
    Vec4 = 10,
    UString = 11,
    PolyPtr = 30,
    Link = 40,
    Bitfield = 50,
    Array = 60,
    Structure = 70,
}

#[derive(Debug, Clone, Copy)]
pub struct Bitfield {
    pub mask: u32,
    pub flags: u32,
}

/// A link target, resolved in a deferred second pass against the trailing link table. `Null`
/// covers the wire's `0xFFFF` sentinel id.
#[derive(Debug, Clone, Default)]
pub enum Link {
    #[default]
    Null,
    Unresolved {
        id: u16,
    },
    Resolved {
        scoped_name_hashes: Vec<u32>,
    },
}

#[derive(Debug, Clone)]
pub enum Value {
    Int32(i32),
    UInt32(u32),
    Float(f32),
    Bool(bool),
    Vec3([f32; 3]),
    Vec2([f32; 2]),
    Mat4([f32; 16]),
    AString(String),
    UInt64(u64),
    Vec4([f32; 4]),
    UString(String),
    Bitfield(Bitfield),
    PolyPtr(Option<Box<Object>>),
    Link(Link),
    Array { element_type: ValueType, elements: Vec<Value> },
    Structure(Box<Object>),
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name_hash: u32,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct Object {
    pub definition_hash: u32,
    pub name: String,
    pub properties: Vec<Property>,
    pub is_collection: bool,
    pub objects: Vec<Object>,
}

impl Object {
    fn new_root() -> Self {
        Object {
            definition_hash: 0,
            name: "root".to_string(),
            properties: Vec::new(),
            is_collection: true,
            objects: Vec::new(),
        }
    }

    fn new_leaf(definition_hash: u32) -> Self {
        Object {
            definition_hash,
            name: String::new(),
            properties: Vec::new(),
            is_collection: false,
            objects: Vec::new(),
        }
    }

    pub fn get(&self, name_hash: u32) -> Option<&Property> {
        self.properties.iter().find(|p| p.name_hash == name_hash)
    }
}

/// A parsed attribute tree.
pub struct AttributeTree {
    pub format_revision: u8,
    pub root: Object,
}

impl AttributeTree {
    fn parse(stream: &SharedStream) -> Result<Self> {
        let mut guard = stream.lock().expect("stream mutex poisoned");
        guard.seek(SeekFrom::Start(0))?;
        let magic = guard.read_u32_le()?;
        if magic & 0x00FF_FFFF != HEADER_MAGIC_LOW24 {
            return Err(VfsError::FormatMismatch("atb: bad magic"));
        }
        let format_revision = (magic >> 24) as u8;

        let mut root = Object::new_root();
        read_collection(&mut *guard, &mut root)?;
        resolve_links(&mut *guard, &mut root)?;

        Ok(AttributeTree { format_revision, root })
    }
}

fn read_collection(stream: &mut dyn Stream, dest: &mut Object) -> Result<()> {
    debug_assert!(dest.is_collection);
    let count = stream.read_u16_le()? as usize;
    dest.objects.reserve(count);
    for _ in 0..count {
        read_collection_entry(stream, dest)?;
    }
    Ok(())
}

fn read_collection_entry(stream: &mut dyn Stream, dest_collection: &mut Object) -> Result<()> {
    let definition_hash = stream.read_u32_le()?;
    let name_len = stream.read_u8()? as usize;
    let mut name_buf = vec![0u8; name_len];
    stream.read_exact_buf(&mut name_buf)?;
    let name = String::from_utf8_lossy(&name_buf).into_owned();

    let mut obj = Object::new_leaf(definition_hash);
    obj.name = name;

    read_object(stream, &mut obj)?;

    if is_known_collection(definition_hash) {
        obj.is_collection = true;
        read_collection(stream, &mut obj)?;
    } else {
        let zero_guard = stream.read_u16_le()?;
        if zero_guard != 0 {
            return Err(VfsError::Corrupt(format!(
                "atb: expected zero collection-count guard after non-collection object, got {zero_guard}"
            )));
        }
    }

    dest_collection.objects.push(obj);
    Ok(())
}

fn read_object(stream: &mut dyn Stream, dest: &mut Object) -> Result<()> {
    loop {
        let tag = stream.read_u8()?;
        let Some(ty) = ValueType::from_u8(tag) else {
            return Err(VfsError::Corrupt(format!("atb: unknown value type tag {tag}")));
        };
        if ty == ValueType::Invalid {
            break;
        }
        let prop_name_hash = stream.read_u32_le()?;
        let value = read_property_value(stream, ty)?;
        dest.properties.push(Property { name_hash: prop_name_hash, value });
    }
    Ok(())
}

fn read_property_value(stream: &mut dyn Stream, ty: ValueType) -> Result<Value> {
    Ok(match ty {
        ValueType::Invalid => {
            return Err(VfsError::Corrupt("atb: Invalid is not a readable value type".into()))
        }
        ValueType::Int32 => Value::Int32(stream.read_i32_le()?),
        ValueType::UInt32 => Value::UInt32(stream.read_u32_le()?),
        ValueType::Float => Value::Float(stream.read_f32_le()?),
        ValueType::Bool => Value::Bool(stream.read_u8()? != 0),
        ValueType::Vec3 => {
            Value::Vec3([stream.read_f32_le()?, stream.read_f32_le()?, stream.read_f32_le()?])
        }
        ValueType::Vec2 => Value::Vec2([stream.read_f32_le()?, stream.read_f32_le()?]),
        ValueType::Mat4 => {
            let mut m = [0f32; 16];
            for slot in m.iter_mut() {
                *slot = stream.read_f32_le()?;
            }
            Value::Mat4(m)
        }
        ValueType::AString => {
            let len = stream.read_u16_le()? as usize;
            let mut buf = vec![0u8; len];
            stream.read_exact_buf(&mut buf)?;
            Value::AString(String::from_utf8_lossy(&buf).into_owned())
        }
        ValueType::UInt64 => Value::UInt64(stream.read_u64_le()?),
        ValueType::Vec4 => Value::Vec4([
            stream.read_f32_le()?,
            stream.read_f32_le()?,
            stream.read_f32_le()?,
            stream.read_f32_le()?,
        ]),
        ValueType::UString => {
            let byte_count = stream.read_u16_le()? as usize;
            let mut buf = vec![0u8; byte_count];
            stream.read_exact_buf(&mut buf)?;
            Value::UString(String::from_utf8_lossy(&buf).into_owned())
        }
        ValueType::Bitfield => {
            let mask = stream.read_u32_le()?;
            let flags = stream.read_u32_le()?;
            Value::Bitfield(Bitfield { mask, flags })
        }
        ValueType::PolyPtr => {
            let definition_hash = stream.read_u32_le()?;
            if definition_hash == 0 {
                Value::PolyPtr(None)
            } else {
                let mut obj = Object::new_leaf(definition_hash);
                read_object(stream, &mut obj)?;
                Value::PolyPtr(Some(Box::new(obj)))
            }
        }
        ValueType::Link => {
            let id = stream.read_u16_le()?;
            if id == LINK_INVALID_ID {
                Value::Link(Link::Null)
            } else {
                Value::Link(Link::Unresolved { id })
            }
        }
        ValueType::Array => {
            let elem_tag = stream.read_u8()?;
            let Some(elem_ty) = ValueType::from_u8(elem_tag) else {
                return Err(VfsError::Corrupt(format!(
                    "atb: unknown array element type tag {elem_tag}"
                )));
            };
            let count = stream.read_u16_le()? as usize;
            let mut elements = Vec::with_capacity(count);
            for _ in 0..count {
                elements.push(read_property_value(stream, elem_ty)?);
            }
            Value::Array { element_type: elem_ty, elements }
        }
        ValueType::Structure => {
            let definition_hash = stream.read_u32_le()?;
            let mut obj = Object::new_leaf(definition_hash);
            read_object(stream, &mut obj)?;
            Value::Structure(Box::new(obj))
        }
    })
}

fn resolve_links(stream: &mut dyn Stream, root: &mut Object) -> Result<()> {
    let name_count = stream.read_u16_le()? as usize;
    let mut link_names = Vec::with_capacity(name_count);
    for _ in 0..name_count {
        let hash_count = stream.read_u8()? as usize;
        let mut hashes = Vec::with_capacity(hash_count);
        for _ in 0..hash_count {
            hashes.push(stream.read_u32_le()?);
        }
        link_names.push(hashes);
    }

    resolve_links_in_object(root, &link_names)
}

fn resolve_links_in_object(obj: &mut Object, link_names: &[Vec<u32>]) -> Result<()> {
    for prop in &mut obj.properties {
        resolve_links_in_value(&mut prop.value, link_names)?;
    }
    for child in &mut obj.objects {
        resolve_links_in_object(child, link_names)?;
    }
    Ok(())
}

fn resolve_links_in_value(value: &mut Value, link_names: &[Vec<u32>]) -> Result<()> {
    match value {
        Value::Link(link @ Link::Unresolved { .. }) => {
            let Link::Unresolved { id } = *link else { unreachable!() };
            let scoped_name_hashes = link_names
                .get(id as usize)
                .cloned()
                .ok_or_else(|| VfsError::Corrupt(format!("atb: link id {id} out of range")))?;
            *link = Link::Resolved { scoped_name_hashes };
        }
        Value::PolyPtr(Some(obj)) => resolve_links_in_object(obj, link_names)?,
        Value::Structure(obj) => resolve_links_in_object(obj, link_names)?,
        Value::Array { elements, .. } => {
            for elem in elements {
                resolve_links_in_value(elem, link_names)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// The definition-name hashes the source reader treats as nested collection roots rather than
/// ordinary leaf objects. Grounded on `atb::Reader`'s `DefIsCollection` allowlist.
pub fn is_known_collection(definition_hash: u32) -> bool {
    known_collection_hashes().contains(&definition_hash)
}

fn known_collection_hashes() -> &'static HashSet<u32> {
    static NAMES: &[&str] = &[
        "act",
        "actormanagersettings",
        "animationgroup",
        "animationsettings",
        "assignedcase",
        "brawlinginterrogationconversation",
        "case",
        "caseactor",
        "charactermanagersettings",
        "clueconversation",
        "constrainedconversation",
        "conversationanimationgroup",
        "conversationbase",
        "customertype",
        "dlcfolder",
        "deadbodysettings",
        "debugpickersettings",
        "decalmanagersettings",
        "demographicsettings",
        "desk",
        "evadeglobalsettings",
        "exitnotebookconversation",
        "exposedcollection",
        "foliagemanagersettings",
        "gamewellconversation",
        "generalaimsettings",
        "getupanimationgroup",
        "gridswapcollection",
        "guncombatsquad",
        "inspectionsession",
        "newact",
        "notebookconversation",
        "notebookentrycollection",
        "notebookpagetemplateset",
        "onchargedconversation",
        "partnerconversation",
        "pedestriansettings",
        "policestation",
        "postprocesssettings",
        "propmanagersettings",
        "roletype",
        "savecollection",
        "scriptedsequenceconversation",
        "steeringpathsettingscollection",
        "streamedcollection",
        "streamingcollection",
        "streetcrimeresponseconversation",
        "targetrangeinstance",
        "targetrangesettings",
        "testcase",
        "tiledmapicons",
        "toggleablecollection",
        "turnuncooperativeconversation",
        "uibranchselection",
        "uibusynotification",
        "uicasecompletescreen",
        "uicasecompletionstats",
        "uicaselistlines",
        "uicasetitle",
        "uicasesmenu3d",
        "uicollection",
        "uicontrollerconfiglines",
        "uicontrollerconfiglinesx360",
        "uicredits",
        "uicreditsscroller",
        "uidlcstore",
        "uielement",
        "uiestablishingshotlayer",
        "uiextrasmenu3d",
        "uifailurescreen",
        "uifullmap",
        "uiicon",
        "uiicondynamic",
        "uiinsertdisc",
        "uiinspectionicon",
        "uiinstallscreen",
        "uilayer",
        "uilegalsscreen",
        "uilegendlayer",
        "uilogscreen",
        "uilogscreenlines",
        "uimainmenu3d",
        "uimapatlasicon",
        "uimaplegend",
        "uimaplegendicons",
        "uimaplegendlabels",
        "uimaplocationinfo",
        "uimaplocationlabel",
        "uimaplocationlabeltext",
        "uimenu",
        "uiminimap",
        "uimousepointer",
        "uinewspaper",
        "uinewspaperclose",
        "uinewspaperopen",
        "uinotebookupdate",
        "uinotebookupdateelement",
        "uioptionsaimmenu",
        "uioptionscameramenu",
        "uioptionscontrolsconfigmenu",
        "uioptionscontrolsconfigmenux360",
        "uioptionscontrolsmenu",
        "uioptionsdisplaymenu",
        "uioptionsdisplayrendersettingsmenu",
        "uioptionsgamemenu",
        "uioptionsgammamenu",
        "uioptionsmenu",
        "uioptionssoundmenu",
        "uioutfitselection",
        "uipausemenu",
        "uirendersettingslines",
        "uisaveselect",
        "uisaveselectlines",
        "uishield",
        "uisocialclub",
        "uisocialclubagecheck",
        "uisocialclubdocselect",
        "uisocialclubintro",
        "uisocialclubnews",
        "uisocialclubpasswordreset",
        "uisocialclubsignin",
        "uisocialclubtos",
        "uisocialclubwelcome",
        "uistatsscreen",
        "uistatsscreenlines",
        "uistreamedfolder",
        "uistreamedtexture",
        "uistreamedtexturescreen",
        "uistreamingscreen",
        "uistring",
        "uisubtitlelayer",
        "uisurface",
        "uitextbox",
        "uititlecardscreen",
        "uitutoriallayer",
        "uiunassignedcasetitle",
        "uiwindow",
        "uiyesno",
        "unassignedcase",
        "unconstrainedconversation",
        "unusedobjectscollection",
        "vehicleconversation",
        "vehicleshowroom",
        "vehicleshowroominfo",
        "weathermanagersettings",
        "workertype",
        "worldbookmarkcollection",
    ];
    static TABLE: OnceLock<HashSet<u32>> = OnceLock::new();
    TABLE.get_or_init(|| NAMES.iter().map(|n| crate::hash::crc32(n.as_bytes())).collect())
}

pub fn descriptor() -> FileTypeDescriptor {
    FileTypeDescriptor { name: "attribute_tree", priority: 50, validate, open }
}

fn validate(stream: &SharedStream) -> Result<bool> {
    let Some(magic) = super::peek_magic_u32(stream)? else { return Ok(false) };
    Ok(magic & 0x00FF_FFFF == HEADER_MAGIC_LOW24)
}

fn open(stream: SharedStream, path: Path) -> Result<File> {
    let tree = AttributeTree::parse(&stream)?;
    Ok(File::new(path, stream, FileKind::AttributeTree(Box::new(tree))))
}
