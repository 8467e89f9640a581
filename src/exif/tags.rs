//! Static EXIF tag tables.

/// IFD sections of a TIFF/EXIF structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ifd {
    Zeroth,
    Exif,
    Gps,
    First,
}

impl Ifd {
    pub fn name(self) -> &'static str {
        match self {
            Ifd::Zeroth => "0th",
            Ifd::Exif => "Exif",
            Ifd::Gps => "GPS",
            Ifd::First => "1st",
        }
    }
}

/// How a writable tag's value is encoded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// ASCII/UTF-8 string.
    Text,
    /// Windows `XP*` tag: UTF-16LE bytes with a NUL terminator.
    Utf16Le,
    /// Undefined bytes behind an 8-byte charset header.
    UserComment,
}

/// A tag the writer is allowed to emit.
#[derive(Debug, Clone, Copy)]
pub struct WritableTag {
    pub name: &'static str,
    pub ifd: Ifd,
    pub id: u16,
    pub encoding: Encoding,
}

pub const TAG_USER_COMMENT: u16 = 0x9286;
pub const TAG_XP_TITLE: u16 = 0x9C9B;
pub const TAG_XP_COMMENT: u16 = 0x9C9C;
pub const TAG_XP_AUTHOR: u16 = 0x9C9D;
pub const TAG_XP_KEYWORDS: u16 = 0x9C9E;
pub const TAG_XP_SUBJECT: u16 = 0x9C9F;

/// Tags accepted by [`write_exif`](super::write_exif). Anything else is dropped.
pub const WRITABLE_TAGS: &[WritableTag] = &[
    WritableTag { name: "Artist", ifd: Ifd::Zeroth, id: 0x013B, encoding: Encoding::Text },
    WritableTag { name: "Copyright", ifd: Ifd::Zeroth, id: 0x8298, encoding: Encoding::Text },
    WritableTag { name: "ImageDescription", ifd: Ifd::Zeroth, id: 0x010E, encoding: Encoding::Text },
    WritableTag { name: "Software", ifd: Ifd::Zeroth, id: 0x0131, encoding: Encoding::Text },
    WritableTag { name: "DateTime", ifd: Ifd::Zeroth, id: 0x0132, encoding: Encoding::Text },
    WritableTag { name: "Make", ifd: Ifd::Zeroth, id: 0x010F, encoding: Encoding::Text },
    WritableTag { name: "Model", ifd: Ifd::Zeroth, id: 0x0110, encoding: Encoding::Text },
    WritableTag { name: "XPSubject", ifd: Ifd::Zeroth, id: TAG_XP_SUBJECT, encoding: Encoding::Utf16Le },
    WritableTag { name: "XPKeywords", ifd: Ifd::Zeroth, id: TAG_XP_KEYWORDS, encoding: Encoding::Utf16Le },
    WritableTag { name: "XPComment", ifd: Ifd::Zeroth, id: TAG_XP_COMMENT, encoding: Encoding::Utf16Le },
    WritableTag { name: "DateTimeOriginal", ifd: Ifd::Exif, id: 0x9003, encoding: Encoding::Text },
    WritableTag { name: "DateTimeDigitized", ifd: Ifd::Exif, id: 0x9004, encoding: Encoding::Text },
    WritableTag { name: "UserComment", ifd: Ifd::Exif, id: TAG_USER_COMMENT, encoding: Encoding::UserComment },
];

pub fn writable(name: &str) -> Option<&'static WritableTag> {
    WRITABLE_TAGS.iter().find(|t| t.name == name)
}

// Image/Exif IFD tags, keyed by tag id.
const MAIN_TAGS: &[(u16, &str)] = &[
    (0x00FE, "NewSubfileType"),
    (0x0100, "ImageWidth"),
    (0x0101, "ImageLength"),
    (0x0102, "BitsPerSample"),
    (0x0103, "Compression"),
    (0x0106, "PhotometricInterpretation"),
    (0x010E, "ImageDescription"),
    (0x010F, "Make"),
    (0x0110, "Model"),
    (0x0111, "StripOffsets"),
    (0x0112, "Orientation"),
    (0x0115, "SamplesPerPixel"),
    (0x0116, "RowsPerStrip"),
    (0x0117, "StripByteCounts"),
    (0x011A, "XResolution"),
    (0x011B, "YResolution"),
    (0x011C, "PlanarConfiguration"),
    (0x0128, "ResolutionUnit"),
    (0x0131, "Software"),
    (0x0132, "DateTime"),
    (0x013B, "Artist"),
    (0x013E, "WhitePoint"),
    (0x013F, "PrimaryChromaticities"),
    (0x0201, "JPEGInterchangeFormat"),
    (0x0202, "JPEGInterchangeFormatLength"),
    (0x0211, "YCbCrCoefficients"),
    (0x0213, "YCbCrPositioning"),
    (0x0214, "ReferenceBlackWhite"),
    (0x4746, "Rating"),
    (0x8298, "Copyright"),
    (0x829A, "ExposureTime"),
    (0x829D, "FNumber"),
    (0x8769, "ExifOffset"),
    (0x8822, "ExposureProgram"),
    (0x8825, "GPSInfo"),
    (0x8827, "ISOSpeedRatings"),
    (0x8830, "SensitivityType"),
    (0x9000, "ExifVersion"),
    (0x9003, "DateTimeOriginal"),
    (0x9004, "DateTimeDigitized"),
    (0x9010, "OffsetTime"),
    (0x9011, "OffsetTimeOriginal"),
    (0x9012, "OffsetTimeDigitized"),
    (0x9101, "ComponentsConfiguration"),
    (0x9102, "CompressedBitsPerPixel"),
    (0x9201, "ShutterSpeedValue"),
    (0x9202, "ApertureValue"),
    (0x9203, "BrightnessValue"),
    (0x9204, "ExposureBiasValue"),
    (0x9205, "MaxApertureValue"),
    (0x9206, "SubjectDistance"),
    (0x9207, "MeteringMode"),
    (0x9208, "LightSource"),
    (0x9209, "Flash"),
    (0x920A, "FocalLength"),
    (0x9214, "SubjectArea"),
    (0x927C, "MakerNote"),
    (0x9286, "UserComment"),
    (0x9290, "SubSecTime"),
    (0x9291, "SubSecTimeOriginal"),
    (0x9292, "SubSecTimeDigitized"),
    (TAG_XP_TITLE, "XPTitle"),
    (TAG_XP_COMMENT, "XPComment"),
    (TAG_XP_AUTHOR, "XPAuthor"),
    (TAG_XP_KEYWORDS, "XPKeywords"),
    (TAG_XP_SUBJECT, "XPSubject"),
    (0xA000, "FlashpixVersion"),
    (0xA001, "ColorSpace"),
    (0xA002, "PixelXDimension"),
    (0xA003, "PixelYDimension"),
    (0xA004, "RelatedSoundFile"),
    (0xA005, "InteroperabilityOffset"),
    (0xA20E, "FocalPlaneXResolution"),
    (0xA20F, "FocalPlaneYResolution"),
    (0xA210, "FocalPlaneResolutionUnit"),
    (0xA215, "ExposureIndex"),
    (0xA217, "SensingMethod"),
    (0xA300, "FileSource"),
    (0xA301, "SceneType"),
    (0xA302, "CFAPattern"),
    (0xA401, "CustomRendered"),
    (0xA402, "ExposureMode"),
    (0xA403, "WhiteBalance"),
    (0xA404, "DigitalZoomRatio"),
    (0xA405, "FocalLengthIn35mmFilm"),
    (0xA406, "SceneCaptureType"),
    (0xA407, "GainControl"),
    (0xA408, "Contrast"),
    (0xA409, "Saturation"),
    (0xA40A, "Sharpness"),
    (0xA40C, "SubjectDistanceRange"),
    (0xA420, "ImageUniqueID"),
    (0xA430, "CameraOwnerName"),
    (0xA431, "BodySerialNumber"),
    (0xA432, "LensSpecification"),
    (0xA433, "LensMake"),
    (0xA434, "LensModel"),
    (0xA435, "LensSerialNumber"),
];

// GPS IFD tags. Their ids overlap the low range of other IFDs.
const GPS_TAGS: &[(u16, &str)] = &[
    (0x0000, "GPSVersionID"),
    (0x0001, "GPSLatitudeRef"),
    (0x0002, "GPSLatitude"),
    (0x0003, "GPSLongitudeRef"),
    (0x0004, "GPSLongitude"),
    (0x0005, "GPSAltitudeRef"),
    (0x0006, "GPSAltitude"),
    (0x0007, "GPSTimeStamp"),
    (0x0008, "GPSSatellites"),
    (0x0009, "GPSStatus"),
    (0x000A, "GPSMeasureMode"),
    (0x000B, "GPSDOP"),
    (0x000C, "GPSSpeedRef"),
    (0x000D, "GPSSpeed"),
    (0x000E, "GPSTrackRef"),
    (0x000F, "GPSTrack"),
    (0x0010, "GPSImgDirectionRef"),
    (0x0011, "GPSImgDirection"),
    (0x0012, "GPSMapDatum"),
    (0x0013, "GPSDestLatitudeRef"),
    (0x0014, "GPSDestLatitude"),
    (0x0015, "GPSDestLongitudeRef"),
    (0x0016, "GPSDestLongitude"),
    (0x0017, "GPSDestBearingRef"),
    (0x0018, "GPSDestBearing"),
    (0x0019, "GPSDestDistanceRef"),
    (0x001A, "GPSDestDistance"),
    (0x001B, "GPSProcessingMethod"),
    (0x001C, "GPSAreaInformation"),
    (0x001D, "GPSDateStamp"),
    (0x001E, "GPSDifferential"),
    (0x001F, "GPSHPositioningError"),
];

/// Resolve a tag id to its standard name.
pub fn tag_name(code: u16) -> Option<&'static str> {
    let table = if code < 0x0020 { GPS_TAGS } else { MAIN_TAGS };
    table.iter().find(|(id, _)| *id == code).map(|(_, name)| *name)
}

/// Name for a tag outside the dictionary, e.g. `0th:0xC4A5`.
pub fn fallback_name(ifd: Ifd, code: u16) -> String {
    format!("{}:0x{code:04X}", ifd.name())
}
