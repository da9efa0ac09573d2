//! Error catalog: static definitions every engine failure maps onto

use crate::entry::ErrorEntry;
use http::StatusCode;

/// Static error definition from catalog
#[derive(Debug, Clone, Copy)]
pub struct ErrDef {
    pub status: u16,
    pub code: &'static str,
    pub title: &'static str,
}

impl ErrDef {
    /// Convert this error definition into an entry with the given detail
    #[inline]
    pub fn as_entry(&self, detail: impl Into<String>) -> ErrorEntry {
        // Convert u16 to StatusCode, using INTERNAL_SERVER_ERROR as fallback for invalid codes
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ErrorEntry::new(status, self.code, self.title, detail)
    }
}

/// Title of validation entries is built per occurrence (`field - message`).
pub const VALIDATION_ERROR: ErrDef = ErrDef {
    status: 422,
    code: "100",
    title: "Validation error",
};

pub const INVALID_RESOURCE: ErrDef = ErrDef {
    status: 400,
    code: "101",
    title: "Invalid resource",
};

pub const FILTER_NOT_ALLOWED: ErrDef = ErrDef {
    status: 400,
    code: "102",
    title: "Filter not allowed",
};

pub const INVALID_FIELD_VALUE: ErrDef = ErrDef {
    status: 400,
    code: "103",
    title: "Invalid field value",
};

pub const INVALID_FIELD: ErrDef = ErrDef {
    status: 400,
    code: "104",
    title: "Invalid field",
};

pub const PARAM_NOT_ALLOWED: ErrDef = ErrDef {
    status: 400,
    code: "105",
    title: "Param not allowed",
};

pub const PARAM_MISSING: ErrDef = ErrDef {
    status: 400,
    code: "106",
    title: "Missing Parameter",
};

pub const INVALID_FILTER_VALUE: ErrDef = ErrDef {
    status: 400,
    code: "107",
    title: "Invalid filter value",
};

pub const COUNT_MISMATCH: ErrDef = ErrDef {
    status: 400,
    code: "108",
    title: "Count to key mismatch",
};

pub const KEY_NOT_INCLUDED_IN_URL: ErrDef = ErrDef {
    status: 400,
    code: "109",
    title: "Key is not included in URL",
};

pub const KEY_REQUIRED: ErrDef = ErrDef {
    status: 400,
    code: "110",
    title: "A key is required",
};

pub const INVALID_INCLUDE: ErrDef = ErrDef {
    status: 400,
    code: "112",
    title: "Invalid include",
};

pub const RELATION_EXISTS: ErrDef = ErrDef {
    status: 400,
    code: "113",
    title: "Relation exists",
};

pub const INVALID_SORT_PARAM: ErrDef = ErrDef {
    status: 400,
    code: "114",
    title: "Invalid sort param",
};

pub const LIMIT_EXCEEDED: ErrDef = ErrDef {
    status: 400,
    code: "115",
    title: "Request limit exceeded",
};

pub const RECORD_NOT_FOUND: ErrDef = ErrDef {
    status: 404,
    code: "404",
    title: "Record not found",
};

pub const LOCKED: ErrDef = ErrDef {
    status: 423,
    code: "423",
    title: "Locked resource",
};

pub const INTERNAL: ErrDef = ErrDef {
    status: 500,
    code: "500",
    title: "Internal Server Error",
};

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn err_def_to_entry_works() {
        let entry = RECORD_NOT_FOUND.as_entry("The record identified by 7 could not be found.");
        assert_eq!(entry.status, StatusCode::NOT_FOUND);
        assert_eq!(entry.title, "Record not found");
        assert_eq!(entry.code, "404");
        assert_eq!(
            entry.detail,
            "The record identified by 7 could not be found."
        );
    }

    #[test]
    fn invalid_status_falls_back_to_internal() {
        let def = ErrDef {
            status: 42,
            code: "x",
            title: "Broken",
        };
        assert_eq!(
            def.as_entry("d").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
