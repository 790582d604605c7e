#[cfg(target_arch = "x86_64")]
pub fn cpuid(eax: u32, ecx: u32) -> (u32, u32, u32, u32) {
    let mut ebx: u32;
    let mut edx: u32;
    let mut eax_out = eax;
    let mut ecx_out = ecx;

    unsafe {
        std::arch::asm!(
            "mov {0:r}, rbx",
            "cpuid",
            "xchg {0:r}, rbx",
            out(reg) ebx,
            inout("eax") eax_out,
            inout("ecx") ecx_out,
            out("edx") edx,
            options(nostack, preserves_flags)
        );
    }

    (eax_out, ebx, ecx_out, edx)
}

#[cfg(not(target_arch = "x86_64"))]
pub fn cpuid(_eax: u32, _ecx: u32) -> (u32, u32, u32, u32) {
    (0, 0, 0, 0)
}

/// 12-byte vendor identification string from leaf 0
pub fn vendor_string() -> String {
    let (_eax, ebx, ecx, edx) = cpuid(0, 0);
    vendor_from_registers(ebx, ecx, edx)
}

// The vendor string is laid out EBX, EDX, ECX
fn vendor_from_registers(ebx: u32, ecx: u32, edx: u32) -> String {
    let mut bytes = Vec::with_capacity(12);
    bytes.extend_from_slice(&ebx.to_le_bytes());
    bytes.extend_from_slice(&edx.to_le_bytes());
    bytes.extend_from_slice(&ecx.to_le_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Display family, model and stepping from a leaf 1 EAX signature
///
/// The extended family and model fields only apply when the base family is
/// 0xF, which is the case for every AMD part this crate targets.
pub fn decode_signature(eax: u32) -> (u32, u32, u32) {
    let stepping = eax & 0xF;
    let base_model = (eax >> 4) & 0xF;
    let base_family = (eax >> 8) & 0xF;
    let extended_model = (eax >> 16) & 0xF;
    let extended_family = (eax >> 20) & 0xFF;

    if base_family == 0xF {
        (
            base_family + extended_family,
            (extended_model << 4) | base_model,
            stepping,
        )
    } else {
        (base_family, base_model, stepping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_layout() {
        // "AuthenticAMD"
        assert_eq!(
            vendor_from_registers(0x6874_7541, 0x444D_4163, 0x6974_6E65),
            "AuthenticAMD"
        );
    }

    #[test]
    fn test_decode_milan_signature() {
        // Family 19h model 01h stepping 1 (EPYC 7003)
        assert_eq!(decode_signature(0x00A0_0F11), (0x19, 0x01, 1));
    }

    #[test]
    fn test_decode_rome_signature() {
        // Family 17h model 31h stepping 0 (EPYC 7002)
        assert_eq!(decode_signature(0x0083_0F10), (0x17, 0x31, 0));
    }

    #[test]
    #[allow(clippy::similar_names)] // CPU register names are standard
    fn test_cpuid() {
        let (eax, ebx, ecx, edx) = cpuid(0, 0);
        println!("CPUID(0,0): EAX={eax:08X} EBX={ebx:08X} ECX={ecx:08X} EDX={edx:08X}");
    }
}
