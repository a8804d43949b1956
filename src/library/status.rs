//! Library status codes.

use std::fmt;

/// Status code returned by a failing library call.
///
/// Negative codes are library errors; positive codes are operating-system
/// errors surfaced through the library (e.g. a missing file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    /// No such file or directory.
    pub const ENOENT: Status = Status(2);
    /// File exists.
    pub const EEXIST: Status = Status(17);
    /// Not a valid id.
    pub const EBADID: Status = Status(-33);
    /// Invalid argument.
    pub const EINVAL: Status = Status(-36);
    /// Write to read only.
    pub const EPERM: Status = Status(-37);
    /// Index exceeds dimension bound.
    pub const EINVALCOORDS: Status = Status(-40);
    /// Name in use.
    pub const ENAMEINUSE: Status = Status(-42);
    /// Attribute not found.
    pub const ENOTATT: Status = Status(-43);
    /// Not a valid data type.
    pub const EBADTYPE: Status = Status(-45);
    /// Invalid dimension id or name.
    pub const EBADDIM: Status = Status(-46);
    /// Variable not found.
    pub const ENOTVAR: Status = Status(-49);
    /// Unknown file format.
    pub const ENOTNC: Status = Status(-51);
    /// Name too long.
    pub const EMAXNAME: Status = Status(-53);
    /// Unlimited dimension already in use.
    pub const EUNLIMIT: Status = Status(-54);
    /// Conversion between text and numbers.
    pub const ECHAR: Status = Status(-56);
    /// Start+count exceeds dimension bound.
    pub const EEDGE: Status = Status(-57);
    /// Illegal stride.
    pub const ESTRIDE: Status = Status(-58);
    /// Name contains illegal characters.
    pub const EBADNAME: Status = Status(-59);
    /// Numeric conversion not representable.
    pub const ERANGE: Status = Status(-60);
    /// NetCDF-4 operation on a NetCDF-3 file.
    pub const ENOTNC4: Status = Status(-111);
    /// Bad group id.
    pub const EBADGRPID: Status = Status(-116);
    /// No group found.
    pub const ENOGRP: Status = Status(-125);

    /// The library's human-readable message for this status.
    pub fn message(self) -> &'static str {
        match self {
            Self::ENOENT => "No such file or directory",
            Self::EEXIST => "File exists",
            Self::EBADID => "NetCDF: Not a valid ID",
            Self::EINVAL => "NetCDF: Invalid argument",
            Self::EPERM => "NetCDF: Write to read only",
            Self::EINVALCOORDS => "NetCDF: Index exceeds dimension bound",
            Self::ENAMEINUSE => "NetCDF: String match to name in use",
            Self::ENOTATT => "NetCDF: Attribute not found",
            Self::EBADTYPE => "NetCDF: Not a valid data type or _FillValue type mismatch",
            Self::EBADDIM => "NetCDF: Invalid dimension ID or name",
            Self::ENOTVAR => "NetCDF: Variable not found",
            Self::ENOTNC => "NetCDF: Unknown file format",
            Self::EMAXNAME => "NetCDF: Name too long",
            Self::EUNLIMIT => "NetCDF: NC_UNLIMITED size already in use",
            Self::ECHAR => "NetCDF: Attempt to convert between text & numbers",
            Self::EEDGE => "NetCDF: Start+count exceeds dimension bound",
            Self::ESTRIDE => "NetCDF: Illegal stride",
            Self::EBADNAME => "NetCDF: Name contains illegal characters",
            Self::ERANGE => "NetCDF: Numeric conversion not representable",
            Self::ENOTNC4 => "NetCDF: Attempting netcdf-4 operation on netcdf-3 file",
            Self::EBADGRPID => "NetCDF: Bad group ID",
            Self::ENOGRP => "NetCDF: No group found.",
            _ => "Unknown Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Status {}
