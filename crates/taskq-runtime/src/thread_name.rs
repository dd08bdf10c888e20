//! Best-effort naming of the current thread
//!
//! Used in debug/trace builds to name pool workers after the label of the
//! queue they are currently draining. Platform-specific; silently a no-op
//! where no mechanism is available.

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// Rename the calling thread (truncated to the kernel's 15 byte limit)
        pub fn set_current_thread_name(name: &str) {
            let mut bytes = name.as_bytes().to_vec();
            bytes.truncate(15);
            bytes.push(0);
            unsafe {
                libc::prctl(libc::PR_SET_NAME, bytes.as_ptr() as libc::c_ulong, 0, 0, 0);
            }
        }
    } else {
        /// No naming mechanism on this platform
        pub fn set_current_thread_name(_name: &str) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_name_does_not_panic() {
        set_current_thread_name("taskq.test");
        set_current_thread_name("a-label-well-beyond-the-fifteen-byte-limit");
        set_current_thread_name("");
    }
}
