use super::{error::FsError, BLOCK_SIZE, MAX_NAME_LEN, ROOT_NAME};

/// Number of `BLOCK_SIZE` blocks needed to hold `bytes`.
pub fn blocks_needed(bytes: u32) -> usize {
    let blocks = bytes / BLOCK_SIZE;
    if bytes % BLOCK_SIZE != 0 {
        blocks as usize + 1
    } else {
        blocks as usize
    }
}

pub fn validate_child_name(name: &str) -> Result<(), FsError> {
    if name.is_empty() {
        return Err(FsError::InvalidArgument("name must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::InvalidArgument(format!(
            "name is longer than {} bytes",
            MAX_NAME_LEN
        )));
    }
    if name.contains('\0') {
        return Err(FsError::InvalidArgument(
            "name must not contain a NUL byte".into(),
        ));
    }
    if name.contains(ROOT_NAME) {
        return Err(FsError::InvalidArgument(format!(
            "name {:?} must not contain '/'",
            name
        )));
    }

    Ok(())
}

pub fn validate_filesize(size: u32) -> Result<(), FsError> {
    if size > i32::MAX as u32 {
        return Err(FsError::InvalidArgument(format!(
            "file size {} does not fit the table format",
            size
        )));
    }

    Ok(())
}

/// Splits an absolute path into its non-empty components.
pub fn components(path: &str) -> Result<Vec<&str>, FsError> {
    if !path.starts_with(ROOT_NAME) {
        return Err(FsError::InvalidArgument(format!(
            "path {:?} is not absolute",
            path
        )));
    }

    Ok(path.split('/').filter(|c| !c.is_empty()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_count_law() {
        assert_eq!(blocks_needed(0), 0);
        assert_eq!(blocks_needed(1), 1);
        assert_eq!(blocks_needed(4095), 1);
        assert_eq!(blocks_needed(4096), 1);
        assert_eq!(blocks_needed(4097), 2);
        assert_eq!(blocks_needed(3 * 4096), 3);
    }

    #[test]
    fn child_names() {
        assert!(validate_child_name("notes.txt").is_ok());
        assert!(validate_child_name("").is_err());
        assert!(validate_child_name("a/b").is_err());
        assert!(validate_child_name("/").is_err());
        assert!(validate_child_name("nul\0").is_err());
        assert!(validate_child_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_child_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn filesize_limit() {
        assert!(validate_filesize(i32::MAX as u32).is_ok());
        assert!(validate_filesize(i32::MAX as u32 + 1).is_err());
    }

    #[test]
    fn path_components() -> anyhow::Result<()> {
        assert!(components("/")?.is_empty());
        assert_eq!(components("/usr//bin/")?, vec!["usr", "bin"]);
        assert!(components("usr/bin").is_err());
        Ok(())
    }
}
