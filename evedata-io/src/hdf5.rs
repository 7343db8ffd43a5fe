//! HDF5 container backend.
//!
//! Every call opens the file, walks or reads what it needs and closes it
//! again, so an [`Hdf5Container`] never holds a file handle.
//!
//! eveH5 stores most devices as 1-D compound datasets whose member names
//! are only known at run time (the value member is named after the device).
//! Members are read one at a time through a single-member compound memory
//! type; HDF5 matches compound members by name and converts the storage
//! type on the fly.

use crate::{Error, Result};
use evedata_core::container::{AttrValue, Attributes, Column, ContainerSource, FieldType, LeafData, Node, NodeKind};
use hdf5::types::{
    CompoundField, CompoundType, FixedAscii, FixedUnicode, H5Type, TypeDescriptor, VarLenAscii, VarLenUnicode,
};
use hdf5::{Container, Dataset, Group, Location};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Capacity used for fixed-length strings; longer strings are truncated.
const TEXT_LEN: usize = 1024;

thread_local! {
    /// Name of the compound member a [`Member`] read targets.
    static MEMBER: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Memory type selecting one named member of a compound dataset.
#[repr(transparent)]
#[derive(Clone)]
struct Member<T>(T);

// SAFETY: `Member<T>` is `repr(transparent)` over `T`, so a compound with a
// single member of type `T` at offset 0 and size `size_of::<T>()` describes
// its memory layout exactly.
#[allow(unsafe_code)]
unsafe impl<T: H5Type> H5Type for Member<T> {
    fn type_descriptor() -> TypeDescriptor {
        let name = MEMBER.with(|m| m.borrow().clone());
        TypeDescriptor::Compound(CompoundType {
            fields: vec![CompoundField::new(&name, T::type_descriptor(), 0, 0)],
            size: std::mem::size_of::<T>(),
        })
    }
}

fn read_member<T: H5Type + Clone>(dataset: &Dataset, name: &str) -> hdf5::Result<Vec<T>> {
    MEMBER.with(|m| name.clone_into(&mut m.borrow_mut()));
    let result = dataset.read_raw::<Member<T>>();
    MEMBER.with(|m| m.borrow_mut().clear());
    Ok(result?.into_iter().map(|m| m.0).collect())
}

fn backend(path: &str, e: &hdf5::Error) -> evedata_core::Error {
    evedata_core::Error::Container(format!("{path}: {e}"))
}

fn classify(descriptor: &TypeDescriptor) -> Option<FieldType> {
    match descriptor {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => Some(FieldType::Int),
        TypeDescriptor::Float(_) => Some(FieldType::Float),
        TypeDescriptor::FixedAscii(_)
        | TypeDescriptor::FixedUnicode(_)
        | TypeDescriptor::VarLenAscii
        | TypeDescriptor::VarLenUnicode => Some(FieldType::Text),
        TypeDescriptor::FixedArray(..) | TypeDescriptor::VarLenArray(_) => Some(FieldType::Array),
        _ => None,
    }
}

/// First element of a scalar or 1-D container.
fn first<T: H5Type>(container: &Container) -> hdf5::Result<Option<T>> {
    if container.ndim() == 0 {
        return container.read_scalar::<T>().map(Some);
    }
    Ok(container.read_raw::<T>()?.into_iter().next())
}

fn attribute(location: &Location, name: &str) -> hdf5::Result<Option<AttrValue>> {
    let attr = location.attr(name)?;
    let value = match attr.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => first::<i64>(&attr)?.map(AttrValue::Int),
        TypeDescriptor::Float(_) => first::<f64>(&attr)?.map(AttrValue::Float),
        TypeDescriptor::FixedAscii(_) => {
            first::<FixedAscii<TEXT_LEN>>(&attr)?.map(|s| AttrValue::Text(s.as_str().trim_end().to_string()))
        }
        TypeDescriptor::FixedUnicode(_) => {
            first::<FixedUnicode<TEXT_LEN>>(&attr)?.map(|s| AttrValue::Text(s.as_str().trim_end().to_string()))
        }
        TypeDescriptor::VarLenAscii => first::<VarLenAscii>(&attr)?.map(|s| AttrValue::Text(s.as_str().to_string())),
        TypeDescriptor::VarLenUnicode => {
            first::<VarLenUnicode>(&attr)?.map(|s| AttrValue::Text(s.as_str().to_string()))
        }
        other => {
            log::debug!("Ignoring attribute {name} of type {other:?}");
            None
        }
    };
    Ok(value)
}

fn attributes(location: &Location) -> hdf5::Result<Attributes> {
    let mut attrs = Attributes::new();
    for name in location.attr_names()? {
        if let Some(value) = attribute(location, &name)? {
            attrs.insert(name, value);
        }
    }
    Ok(attrs)
}

fn last_component(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

fn dataset_node(dataset: &Dataset) -> hdf5::Result<Node> {
    let name = last_component(&dataset.name());
    let shape = dataset.shape();
    let rows = shape.first().copied().unwrap_or(1);
    let fields = match dataset.dtype()?.to_descriptor()? {
        TypeDescriptor::Compound(compound) => compound
            .fields
            .iter()
            .filter_map(|f| classify(&f.ty).map(|t| (f.name.clone(), t)))
            .collect(),
        descriptor if shape.len() > 1 => classify(&descriptor)
            .map(|_| vec![(name.clone(), FieldType::Array)])
            .unwrap_or_default(),
        descriptor => classify(&descriptor).map(|t| vec![(name.clone(), t)]).unwrap_or_default(),
    };
    Ok(Node {
        name,
        attributes: attributes(dataset)?,
        kind: NodeKind::Leaf { fields, rows },
    })
}

fn group_node(group: &Group, name: String) -> hdf5::Result<Node> {
    let mut children = Vec::new();
    for child in group.groups()? {
        let child_name = last_component(&child.name());
        children.push(group_node(&child, child_name)?);
    }
    for dataset in group.datasets()? {
        children.push(dataset_node(&dataset)?);
    }
    Ok(Node {
        name,
        attributes: attributes(group)?,
        kind: NodeKind::Group(children),
    })
}

fn text_column<T: H5Type + Clone>(values: Vec<T>, as_str: impl Fn(&T) -> &str) -> Column {
    Column::Text(values.iter().map(|v| as_str(v).trim_end().to_string()).collect())
}

fn read_compound_member(dataset: &Dataset, field: &CompoundField) -> hdf5::Result<Option<Column>> {
    let column = match &field.ty {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => Column::Int(read_member::<i64>(dataset, &field.name)?),
        TypeDescriptor::Float(_) => Column::Float(read_member::<f64>(dataset, &field.name)?),
        TypeDescriptor::FixedAscii(_) => text_column(
            read_member::<FixedAscii<TEXT_LEN>>(dataset, &field.name)?,
            FixedAscii::as_str,
        ),
        TypeDescriptor::FixedUnicode(_) => text_column(
            read_member::<FixedUnicode<TEXT_LEN>>(dataset, &field.name)?,
            FixedUnicode::as_str,
        ),
        TypeDescriptor::VarLenAscii => text_column(read_member::<VarLenAscii>(dataset, &field.name)?, VarLenAscii::as_str),
        TypeDescriptor::VarLenUnicode => text_column(
            read_member::<VarLenUnicode>(dataset, &field.name)?,
            VarLenUnicode::as_str,
        ),
        other => {
            log::debug!("Skipping member {} of type {other:?}", field.name);
            return Ok(None);
        }
    };
    Ok(Some(column))
}

fn read_plain(dataset: &Dataset, descriptor: &TypeDescriptor) -> hdf5::Result<Option<Column>> {
    if dataset.ndim() > 1 {
        let array = dataset.read_2d::<f64>()?;
        return Ok(Some(Column::Array(array.rows().into_iter().map(|r| r.to_vec()).collect())));
    }
    let column = match descriptor {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => Column::Int(dataset.read_raw::<i64>()?),
        TypeDescriptor::Float(_) => Column::Float(dataset.read_raw::<f64>()?),
        TypeDescriptor::FixedAscii(_) => text_column(dataset.read_raw::<FixedAscii<TEXT_LEN>>()?, FixedAscii::as_str),
        TypeDescriptor::FixedUnicode(_) => {
            text_column(dataset.read_raw::<FixedUnicode<TEXT_LEN>>()?, FixedUnicode::as_str)
        }
        TypeDescriptor::VarLenAscii => text_column(dataset.read_raw::<VarLenAscii>()?, VarLenAscii::as_str),
        TypeDescriptor::VarLenUnicode => text_column(dataset.read_raw::<VarLenUnicode>()?, VarLenUnicode::as_str),
        _ => return Ok(None),
    };
    Ok(Some(column))
}

fn read_dataset(dataset: &Dataset) -> hdf5::Result<LeafData> {
    let name = last_component(&dataset.name());
    let mut data = LeafData::new();
    match dataset.dtype()?.to_descriptor()? {
        TypeDescriptor::Compound(compound) => {
            for field in &compound.fields {
                if let Some(column) = read_compound_member(dataset, field)? {
                    data = data.with_column(field.name.clone(), column);
                }
            }
        }
        descriptor => {
            if let Some(column) = read_plain(dataset, &descriptor)? {
                data = data.with_column(name, column);
            }
        }
    }
    Ok(data)
}

/// An eveH5 file on disk.
#[derive(Debug, Clone)]
pub struct Hdf5Container {
    path: PathBuf,
    identity: String,
}

impl Hdf5Container {
    /// Checks that `path` is a readable HDF5 file.
    ///
    /// # Errors
    /// Returns an error if the file does not exist or is not HDF5.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        drop(hdf5::File::open(&path)?);
        let identity = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        log::debug!("Opened HDF5 container {}", path.display());
        Ok(Self { path, identity })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> evedata_core::Result<hdf5::File> {
        hdf5::File::open(&self.path).map_err(|e| backend(&self.identity, &e))
    }
}

impl ContainerSource for Hdf5Container {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn scan(&self) -> evedata_core::Result<Node> {
        let file = self.file()?;
        group_node(&file, String::new()).map_err(|e| backend("/", &e))
    }

    fn read(&self, path: &str) -> evedata_core::Result<LeafData> {
        let file = self.file()?;
        if !file.link_exists(path) {
            return Err(evedata_core::Error::MissingItem(path.to_string()));
        }
        let dataset = file.dataset(path).map_err(|e| backend(path, &e))?;
        read_dataset(&dataset).map_err(|e| backend(path, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evedata_core::container::Resource;
    use hdf5::H5Type;
    use std::str::FromStr;
    use tempfile::NamedTempFile;

    #[derive(H5Type, Clone, Copy)]
    #[repr(C)]
    struct Record {
        #[hdf5(rename = "PosCounter")]
        pos_counter: i32,
        #[hdf5(rename = "SimMt:01")]
        value: f64,
    }

    fn fixture() -> NamedTempFile {
        let tmp = NamedTempFile::new().unwrap();
        let file = hdf5::File::create(tmp.path()).unwrap();
        let version = VarLenUnicode::from_str("7").unwrap();
        file.new_attr::<VarLenUnicode>()
            .create("EVEH5Version")
            .unwrap()
            .write_scalar(&version)
            .unwrap();
        let main = file.create_group("c1").unwrap().create_group("main").unwrap();
        let records = [
            Record { pos_counter: 1, value: 0.5 },
            Record { pos_counter: 2, value: 1.5 },
        ];
        let dataset = main.new_dataset_builder().with_data(&records[..]).create("SimMt:01").unwrap();
        dataset
            .new_attr::<VarLenUnicode>()
            .create("DeviceType")
            .unwrap()
            .write_scalar(&VarLenUnicode::from_str("Axis").unwrap())
            .unwrap();
        dataset.new_attr::<i64>().create("Deadband").unwrap().write_scalar(&2_i64).unwrap();
        main.new_dataset_builder().with_data(&[1.0_f64, 2.0, 3.0][..]).create("spectrum").unwrap();
        tmp
    }

    #[test]
    fn test_scan_structure() {
        let tmp = fixture();
        let resource = Resource::new(Hdf5Container::open(tmp.path()).unwrap());
        let root = resource.root().unwrap();
        assert_eq!(root.attributes().text("EVEH5Version").as_deref(), Some("7"));
        let leaf = root.find_group("c1/main").unwrap().leaf("SimMt:01").unwrap();
        assert_eq!(leaf.fields(), &["PosCounter".to_string(), "SimMt:01".to_string()]);
        assert_eq!(leaf.field_type("SimMt:01"), Some(FieldType::Float));
        assert_eq!(leaf.rows(), 2);
        assert_eq!(leaf.attributes().text("DeviceType").as_deref(), Some("Axis"));
        assert_eq!(leaf.attributes().get("Deadband").and_then(AttrValue::as_i64), Some(2));
    }

    #[test]
    fn test_read_compound_members() {
        let tmp = fixture();
        let container = Hdf5Container::open(tmp.path()).unwrap();
        let mut data = container.read("/c1/main/SimMt:01").unwrap();
        assert_eq!(data.take_column("PosCounter").and_then(|c| c.to_i64()), Some(vec![1, 2]));
        assert!(matches!(data.take_column("SimMt:01"), Some(Column::Float(v)) if v == vec![0.5, 1.5]));

        let spectrum = container.read("/c1/main/spectrum").unwrap();
        assert!(matches!(spectrum.column("spectrum"), Some(Column::Float(v)) if v.len() == 3));
    }

    #[test]
    fn test_missing_items() {
        let tmp = fixture();
        let container = Hdf5Container::open(tmp.path()).unwrap();
        assert!(matches!(
            container.read("/c1/main/nothing"),
            Err(evedata_core::Error::MissingItem(_))
        ));
        assert!(Hdf5Container::open(tmp.path().with_extension("missing")).is_err());
    }
}
