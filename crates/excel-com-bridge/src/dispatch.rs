//! Late-bound calls into Excel's object model.
//!
//! Everything goes through `IDispatch::Invoke` with names resolved at run
//! time, the way a VBScript caller would. [`DispatchObject`] wraps one
//! object; the `variant_*` functions build and read the argument/return
//! `VARIANT`s.

#![cfg(windows)]

use std::mem::ManuallyDrop;
use std::ptr;

use windows::{
    core::{BSTR, GUID, HSTRING, PCWSTR},
    Win32::{
        Foundation::{DISP_E_EXCEPTION, VARIANT_BOOL},
        Globalization::GetSystemDefaultLCID,
        System::{
            Com::{
                CLSIDFromProgID, CoCreateInstance, IDispatch, CLSCTX_LOCAL_SERVER, DISPATCH_FLAGS,
                DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT, DISPPARAMS,
                EXCEPINFO,
            },
            Ole::DISPID_PROPERTYPUT,
            Variant::{
                VARENUM, VARIANT, VARIANT_0_0_0, VT_BOOL, VT_BSTR, VT_DATE, VT_DISPATCH, VT_EMPTY,
                VT_ERROR, VT_I2, VT_I4, VT_NULL, VT_R4, VT_R8,
            },
        },
    },
};

// VARIANT nests its payload union inside ManuallyDrop wrappers; both
// helpers below are the only places that reach through them.

fn tagged(vt: VARENUM, fill: impl FnOnce(&mut VARIANT_0_0_0)) -> VARIANT {
    let mut v = VARIANT::default();
    unsafe {
        let inner = &mut *v.Anonymous.Anonymous;
        ptr::write(&mut inner.vt, vt);
        fill(&mut inner.Anonymous);
    }
    v
}

fn vt(v: &VARIANT) -> VARENUM {
    unsafe { v.Anonymous.Anonymous.vt }
}

fn payload(v: &VARIANT) -> &VARIANT_0_0_0 {
    unsafe { &v.Anonymous.Anonymous.Anonymous }
}

pub fn variant_empty() -> VARIANT {
    VARIANT::default()
}

pub fn variant_bool(val: bool) -> VARIANT {
    tagged(VT_BOOL, |p| p.boolVal = VARIANT_BOOL(if val { -1 } else { 0 }))
}

pub fn variant_f64(val: f64) -> VARIANT {
    tagged(VT_R8, |p| p.dblVal = val)
}

pub fn variant_i32(val: i32) -> VARIANT {
    tagged(VT_I4, |p| p.lVal = val)
}

pub fn variant_str(val: &str) -> VARIANT {
    let bstr = BSTR::from(val);
    tagged(VT_BSTR, |p| p.bstrVal = ManuallyDrop::new(bstr))
}

/// OLE automation date; shares Excel's serial numbering from 1900-03-01 on
pub fn variant_date(serial: f64) -> VARIANT {
    tagged(VT_DATE, |p| p.date = serial)
}

pub fn variant_get_bool(v: &VARIANT) -> Option<bool> {
    (vt(v) == VT_BOOL).then(|| unsafe { payload(v).boolVal.0 != 0 })
}

/// Any numeric VARIANT widened to f64
pub fn variant_get_f64(v: &VARIANT) -> Option<f64> {
    let p = payload(v);
    unsafe {
        match vt(v) {
            VT_R8 => Some(p.dblVal),
            VT_R4 => Some(f64::from(p.fltVal)),
            VT_I4 => Some(f64::from(p.lVal)),
            VT_I2 => Some(f64::from(p.iVal)),
            _ => None,
        }
    }
}

pub fn variant_get_date(v: &VARIANT) -> Option<f64> {
    (vt(v) == VT_DATE).then(|| unsafe { payload(v).date })
}

pub fn variant_get_string(v: &VARIANT) -> Option<String> {
    (vt(v) == VT_BSTR).then(|| unsafe { payload(v).bstrVal.to_string() })
}

pub fn variant_get_dispatch(v: &VARIANT) -> Option<IDispatch> {
    if vt(v) != VT_DISPATCH {
        return None;
    }
    let disp: &Option<IDispatch> = unsafe { &payload(v).pdispVal };
    disp.clone()
}

/// `VT_EMPTY` or `VT_NULL`
pub fn variant_is_empty(v: &VARIANT) -> bool {
    let vt = vt(v);
    vt == VT_EMPTY || vt == VT_NULL
}

/// SCODE of a `VT_ERROR` value (cell errors come back as these)
pub fn variant_get_error(v: &VARIANT) -> Option<i32> {
    (vt(v) == VT_ERROR).then(|| unsafe { payload(v).scode })
}

/// One COM object reached through `IDispatch`.
#[derive(Clone)]
pub struct DispatchObject {
    inner: IDispatch,
}

impl DispatchObject {
    /// Start (or attach to) a local server such as `Excel.Application`
    pub fn create_from_progid(progid: &str) -> Result<Self, String> {
        let name = HSTRING::from(progid);
        let inner = unsafe {
            let clsid =
                CLSIDFromProgID(&name).map_err(|e| format!("CLSIDFromProgID failed: {e}"))?;
            CoCreateInstance(&clsid, None, CLSCTX_LOCAL_SERVER)
                .map_err(|e| format!("CoCreateInstance failed for '{progid}': {e}"))?
        };
        Ok(Self { inner })
    }

    pub fn from_idispatch(inner: IDispatch) -> Self {
        Self { inner }
    }

    fn dispid(&self, name: &str) -> Result<i32, String> {
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        let names = [PCWSTR(wide.as_ptr())];
        let mut dispid = 0i32;
        unsafe {
            self.inner.GetIDsOfNames(
                &GUID::zeroed(),
                names.as_ptr(),
                1,
                GetSystemDefaultLCID(),
                &mut dispid,
            )
        }
        .map_err(|e| format!("GetIDsOfNames('{name}') failed: {e}"))?;
        Ok(dispid)
    }

    /// `Invoke` with arguments in natural order. A property put passes its
    /// single argument as the named `DISPID_PROPERTYPUT` argument.
    fn invoke(&self, name: &str, flags: DISPATCH_FLAGS, args: &[VARIANT]) -> Result<VARIANT, String> {
        let dispid = self.dispid(name)?;
        let put = flags == DISPATCH_PROPERTYPUT;
        // DISPPARAMS wants the last argument first
        let mut reversed: Vec<VARIANT> = args.iter().rev().cloned().collect();
        let mut put_id = [DISPID_PROPERTYPUT];
        let params = DISPPARAMS {
            rgvarg: if reversed.is_empty() {
                ptr::null_mut()
            } else {
                reversed.as_mut_ptr()
            },
            rgdispidNamedArgs: if put {
                put_id.as_mut_ptr()
            } else {
                ptr::null_mut()
            },
            cArgs: reversed.len() as u32,
            cNamedArgs: u32::from(put),
        };

        let mut result = VARIANT::default();
        let mut except = EXCEPINFO::default();
        unsafe {
            self.inner.Invoke(
                dispid,
                &GUID::zeroed(),
                GetSystemDefaultLCID(),
                flags,
                &params,
                (!put).then_some(&mut result),
                Some(&mut except),
                None,
            )
        }
        .map_err(|e| format_invoke_error(e, &except, name))?;
        Ok(result)
    }

    /// `obj.Name`
    pub fn get_property(&self, name: &str) -> Result<VARIANT, String> {
        self.invoke(name, DISPATCH_PROPERTYGET, &[])
    }

    /// `obj.Name = value`
    pub fn set_property(&self, name: &str, value: VARIANT) -> Result<(), String> {
        self.invoke(name, DISPATCH_PROPERTYPUT, &[value]).map(drop)
    }

    /// `obj.Name(args...)`
    pub fn invoke_method(&self, name: &str, args: &[VARIANT]) -> Result<VARIANT, String> {
        self.invoke(name, DISPATCH_METHOD, args)
    }

    /// This object as a `VT_DISPATCH` argument, e.g. a paste destination
    pub fn to_variant(&self) -> VARIANT {
        let disp = self.inner.clone();
        tagged(VT_DISPATCH, |p| p.pdispVal = ManuallyDrop::new(Some(disp)))
    }

    /// Property returning an object (`app.Workbooks`)
    pub fn get_child(&self, name: &str) -> Result<DispatchObject, String> {
        extract_dispatch(&self.get_property(name)?, name)
    }

    /// Method returning an object (`books.Open(path)`)
    pub fn invoke_child(&self, name: &str, args: &[VARIANT]) -> Result<DispatchObject, String> {
        extract_dispatch(&self.invoke_method(name, args)?, name)
    }

    /// Indexed property returning an object (`Worksheets("izbor")`)
    pub fn get_indexed(&self, name: &str, index: &VARIANT) -> Result<DispatchObject, String> {
        self.get_indexed_args(name, std::slice::from_ref(index))
    }

    /// Property with several indexes (`Cells(row, col)`)
    pub fn get_indexed_args(&self, name: &str, args: &[VARIANT]) -> Result<DispatchObject, String> {
        extract_dispatch(&self.invoke(name, DISPATCH_PROPERTYGET, args)?, name)
    }
}

fn extract_dispatch(variant: &VARIANT, context: &str) -> Result<DispatchObject, String> {
    match variant_get_dispatch(variant) {
        Some(disp) => Ok(DispatchObject::from_idispatch(disp)),
        None if variant_is_empty(variant) => Err(format!("'{context}' returned nothing")),
        None => Err(format!(
            "'{context}' returned VT={} where an object was expected",
            vt(variant).0
        )),
    }
}

fn format_invoke_error(err: windows::core::Error, except: &EXCEPINFO, member: &str) -> String {
    if err.code().0 as u32 != DISP_E_EXCEPTION.0 as u32 {
        return format!("Invoke('{member}') failed: {err}");
    }
    let description = if except.bstrDescription.is_empty() {
        "no description".to_string()
    } else {
        except.bstrDescription.to_string()
    };
    let source = if except.bstrSource.is_empty() {
        "unknown".to_string()
    } else {
        except.bstrSource.to_string()
    };
    format!("COM exception in '{member}': {description} (source: {source})")
}
