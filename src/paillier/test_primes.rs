//! Fixed safe primes, so that tests don't spend minutes generating keys.
//!
//! Each is a 1024 bit Blum safe prime with its top two bits set, so any
//! product of two of them has exactly 2048 bits.
use libpaillier::unknown_order::BigNumber;

use super::SecretKey;

const SAFE_PRIMES: [&str; 10] = [
    "C221BAFBA60E94FE39CDD64C5CA45D723098AA062EBFDE243CD07A4E4BF6F5710B0B5A16435B46D4B45A26F5FA35E975014C1DAE6B0EF61F51A81BFA938EDAD4E853DAEF16C21D22BDD122C5484998D55C35DA9EFA3CE010E3C88E27C7E7C811E0BA525264F8A4227977AEA8E258B4D27BF9EE00C3DF11E45E08E11E12085B7F",
    "E7E124D9B9A35F34F55A01EBE4151EC1EB6152E605720055EF3F83A94307092AE645E0CF85D653654C904EEB435E1C175A506F7F7AD4F406878F5D236A5CB34670395F2BE2363317C0FDB523501FCE631465BFB5DEE84DD6FFF369CE627BB4B72EA7200258298A01A6CF32E92C8362FBD35634ED5333F1EFA04E3F58B892D473",
    "DD67695A0A4BAD7211ABB92CC25D9176274A1F4E02933C1020F855897BEE4EEF795128A738B9D11E1CDDFD0F51BDB84851A01C369F4C29917F8BA03744FEAB310DC0391DFE5A5F668576574D9EFEE0AED33DD97925ADF10C16EA800C08EB1166E41F8DE4469321C168CB3EB9EDC7BABC7558DF5FA12BB3040E4E53DFFF663D27",
    "DF96FEFAA66A3DE80A4069C7D740BEBEB7A169F339A96AE9BE2D2F3489DF88601A356A7DE65D6F0F226C906DF4C3169D4D7D709024D1DE014FF49C8560247498A64CB8A2D65FFD6A89A449C6BEE3C2A8E62B5DC7108D16F217A0EAB09F6AC4B17C871590FC878272831C8187EBD82922637311539EF35F148789E49C69832B8F",
    "D73BCB1CF356AAEF7C673687776C3F1882010F923E8773910726940D4C3F41A17E9B242D83089C14574D32579898B156664AFFF7F13BD2E4B7C238A51D58B78557B3B692A2570E5DC2C1723C8B03139AE3EF9C82C3A2465A74949DC2C5C82C5131CB166608636D33433C7D236C91933EA6330D3359C9CD4560A7CDE564E38237",
    "FE373CD73911C3B72A4C4D3BCE552E4C34EECBB510EB8A0A8E8EBA50349F870F75E0B9B9D362F99B8F1798219588DC5932BAEF53277162883C09F6087AD5F7FE4F18FF86FC4B609ADDC16AB4CA2B43D5660D2F5991628AD0201E27235529D3EFB226C4090CE8D77BC3D57B64C93A8751AA162562821D17541BB386CDF3DC61FF",
    "C7F8DECF4BD8040DA8AF043C129700AA05609C37FD97756F49C795CB5074D247524A8D341CFA733D2E500CE84856DE121B1D36DFC15432D927762B4D1CCD30ACD2F0E1C2CF7C0A410A7D3D2DF5759C4190ABAC75BDB036C5B33429CD1C9F0BEA2F0C860B4881A05334ED7864D4A0335060378DCC24978F5CF61BFA31E01ED9FF",
    "C9A5C50C56BD2CFC5612A499FAD68D4F51C9F47114BB492A8FE14DEB43F60B7364B724C8A35D859270756A003EBC00E337C0FF90A2DA70E7595AED54A5340FB22204BE34C3763562E2AC5627E3B6772809C06B308A738A10D2FA98B6C2023D10C60537261A56ED1A9311D6EA065B32F0A0742DBE999442A92BD4EB78676737D7",
    "EC29734EB953E9F94DA7BAA71E671DDC2E0EFDD9EF08D2FD50A20F075D5B4DF550109AB513DEBD5E88E38A96F55EFBB8F7276B50E3748B3F2479FEF5B4A377A0A2E3A71C90D8C4224893CE1EE48CD3D4F9E1AFEB1E70E90B78D5DC9D6351C53BDF28F9B7F15412F315BB0332E76BC2B2AA968E2D945AF7DD3F41A470D8711283",
    "F3D0C52773A7F6D04870BA4D94E65A96130F5898E82FA28D61DBA328B6CF747B13B7F55A75DD33F1B850BE341E7C5132EFCFE8ECDEB6AF2101922C099D0A94513A89D0E82F44040C0B45CEC8AA789C61D7202821B5A7D5297489B0723557EAE0ACD5C57B73104434C91A7C02A13BAF2D6CAA73218350290757FBA0168AC1F41F",
];

/// The number of distinct keys available.
pub(crate) const KEY_COUNT: usize = SAFE_PRIMES.len() / 2;

pub(crate) fn prime(i: usize) -> BigNumber {
    BigNumber::from_slice(hex::decode(SAFE_PRIMES[i]).unwrap())
}

/// A Paillier key built from the i-th pair of fixed primes.
pub(crate) fn secret_key(i: usize) -> SecretKey {
    SecretKey::from_primes(prime(2 * i), prime(2 * i + 1)).unwrap()
}
