//! End-to-end flows through `DataRoomService` on both storage backends.

use dataroom_core::file::{file_key, FILES_TABLE};
use dataroom_core::{DataRoomService, ErrorKind, FixedClock, ServiceConfig, UploadToken};
use dataroom_crypto::{EcdsaKey, FileDigest};
use dataroom_storage::{KvStore, MemoryKvStore, SledKvStore};
use dataroom_types::{decode_b64, encode_b64, FileInput, KeyInput, UpdateDataRoomInput};
use std::sync::Arc;
use tempfile::TempDir;

const NOW: u64 = 1_700_000_000_000;

struct Issuer {
    key: EcdsaKey,
}

impl Issuer {
    fn new() -> Self {
        Self {
            key: EcdsaKey::generate(),
        }
    }

    fn spki(&self) -> String {
        self.key.export_public_pem().unwrap()
    }

    fn file(&self, name: &str, content: &[u8], issued_at: u64) -> FileInput {
        let digest = FileDigest::of(content);
        let token = UploadToken::issue(*digest.as_bytes(), issued_at, &self.key).unwrap();
        FileInput {
            name: name.into(),
            digest_b64: digest.to_b64(),
            file_type: "application/octet-stream".into(),
            key: "wrapped-key-ref".into(),
            token_b64: token.to_b64(),
        }
    }
}

fn provisioned<S: KvStore>(store: S, issuer: &Issuer) -> DataRoomService<S> {
    let service = DataRoomService::new(store, &ServiceConfig::default());
    service.set_backend_signing_key().unwrap();
    service.set_webserver_verification_key(&issuer.spki()).unwrap();
    service
}

#[test]
fn admits_signed_file_and_rejects_tampered_signature() {
    let issuer = Issuer::new();
    let service = provisioned(MemoryKvStore::new(), &issuer);
    let room = service.create_data_room(None).unwrap();

    let content = b"hello world!";
    assert_eq!(content.len(), 12);
    let input = issuer.file("report.pdf", content, NOW);
    service
        .update_data_room(&UpdateDataRoomInput::add_file(&room, input))
        .unwrap();
    assert_eq!(service.list_files(&room).unwrap(), vec!["report.pdf".to_string()]);

    let stored = service.get_file(&room, "report.pdf").unwrap();
    assert_eq!(&stored.digest, FileDigest::of(content).as_bytes());
    assert_eq!(stored.data_room_id, room);
    assert_eq!(stored.token.len(), 104);

    let mut tampered = issuer.file("copy.pdf", content, NOW);
    let mut token = decode_b64("tokenB64", &tampered.token_b64).unwrap();
    token[70] ^= 0x01;
    tampered.token_b64 = encode_b64(&token);

    let err = service
        .update_data_room(&UpdateDataRoomInput::add_file(&room, tampered))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert_eq!(service.list_files(&room).unwrap().len(), 1);
}

#[test]
fn truncated_token_is_rejected_without_writing() {
    let issuer = Issuer::new();
    let store = MemoryKvStore::new();
    let service = provisioned(store.clone(), &issuer);
    let room = service.create_data_room(Some("room")).unwrap();

    let mut short = issuer.file("a.txt", b"content", NOW);
    let token = decode_b64("tokenB64", &short.token_b64).unwrap();
    short.token_b64 = encode_b64(&token[..103]);

    let err = service
        .update_data_room(&UpdateDataRoomInput::add_file(&room, short))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert!(err.to_string().contains("invalid token size"));
    assert!(service.list_files(&room).unwrap().is_empty());
    assert_eq!(store.table_len(FILES_TABLE), 0);
    assert!(store
        .get(FILES_TABLE, &file_key(&room, "a.txt"))
        .unwrap()
        .is_none());
}

#[test]
fn add_file_needs_an_imported_issuer_key() {
    let issuer = Issuer::new();
    let service = DataRoomService::new(MemoryKvStore::new(), &ServiceConfig::default());
    let room = service.create_data_room(Some("room")).unwrap();

    let err = service
        .update_data_room(&UpdateDataRoomInput::add_file(&room, issuer.file("a", b"a", NOW)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(service.list_files(&room).unwrap().is_empty());
}

#[test]
fn token_from_untrusted_issuer_is_rejected() {
    let trusted = Issuer::new();
    let stranger = Issuer::new();
    let service = provisioned(MemoryKvStore::new(), &trusted);
    let room = service.create_data_room(None).unwrap();

    let err = service
        .update_data_room(&UpdateDataRoomInput::add_file(
            &room,
            stranger.file("a.txt", b"data", NOW),
        ))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert!(err.to_string().contains("invalid signature"));
}

#[test]
fn locked_room_is_frozen() {
    let issuer = Issuer::new();
    let service = provisioned(MemoryKvStore::new(), &issuer);
    let room = service.create_data_room(Some("deal-42")).unwrap();
    service
        .update_data_room(&UpdateDataRoomInput::add_file(&room, issuer.file("a.txt", b"a", NOW)))
        .unwrap();

    service.update_data_room(&UpdateDataRoomInput::lock(&room)).unwrap();
    service.update_data_room(&UpdateDataRoomInput::lock(&room)).unwrap();

    let add = service.update_data_room(&UpdateDataRoomInput::add_file(
        &room,
        issuer.file("b.txt", b"b", NOW),
    ));
    assert_eq!(add.unwrap_err().kind(), ErrorKind::InvalidState);

    let remove = service.update_data_room(&UpdateDataRoomInput::remove_file(&room, "a.txt"));
    assert_eq!(remove.unwrap_err().kind(), ErrorKind::InvalidState);

    let authorize = service.update_data_room(&UpdateDataRoomInput::authorize_key(
        &room,
        KeyInput {
            key_id: "alice".into(),
            spki_public_key: issuer.spki(),
        },
    ));
    assert_eq!(authorize.unwrap_err().kind(), ErrorKind::InvalidState);

    assert_eq!(service.list_files(&room).unwrap(), vec!["a.txt".to_string()]);
    assert!(service.get_file(&room, "a.txt").is_ok());
}

#[test]
fn remove_file_deletes_record() {
    let issuer = Issuer::new();
    let service = provisioned(MemoryKvStore::new(), &issuer);
    let room = service.create_data_room(None).unwrap();
    service
        .update_data_room(&UpdateDataRoomInput::add_file(&room, issuer.file("a.txt", b"a", NOW)))
        .unwrap();

    service
        .update_data_room(&UpdateDataRoomInput::remove_file(&room, "a.txt"))
        .unwrap();
    assert!(service.list_files(&room).unwrap().is_empty());
    assert_eq!(
        service.get_file(&room, "a.txt").unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let again = service.update_data_room(&UpdateDataRoomInput::remove_file(&room, "a.txt"));
    assert_eq!(again.unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn same_file_name_in_two_rooms_is_isolated() {
    let issuer = Issuer::new();
    let service = provisioned(MemoryKvStore::new(), &issuer);
    let first = service.create_data_room(Some("first")).unwrap();
    let second = service.create_data_room(Some("second")).unwrap();

    service
        .update_data_room(&UpdateDataRoomInput::add_file(&first, issuer.file("a.txt", b"one", NOW)))
        .unwrap();
    service
        .update_data_room(&UpdateDataRoomInput::add_file(&second, issuer.file("a.txt", b"two", NOW)))
        .unwrap();
    service
        .update_data_room(&UpdateDataRoomInput::remove_file(&first, "a.txt"))
        .unwrap();

    let kept = service.get_file(&second, "a.txt").unwrap();
    assert_eq!(&kept.digest, FileDigest::of(b"two").as_bytes());
}

#[test]
fn removed_room_is_tombstoned() {
    let issuer = Issuer::new();
    let service = provisioned(MemoryKvStore::new(), &issuer);
    let room = service.create_data_room(Some("gone")).unwrap();
    service.create_data_room(Some("kept")).unwrap();
    service
        .update_data_room(&UpdateDataRoomInput::add_file(&room, issuer.file("a.txt", b"a", NOW)))
        .unwrap();

    service.remove_data_room(&room).unwrap();

    assert_eq!(service.list_data_rooms().unwrap(), vec!["kept".to_string()]);
    assert_eq!(service.list_files(&room).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        service
            .update_data_room(&UpdateDataRoomInput::lock(&room))
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        service.remove_data_room(&room).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn keys_are_one_shot_until_cleared() {
    let issuer = Issuer::new();
    let service = DataRoomService::new(MemoryKvStore::new(), &ServiceConfig::default());
    assert!(service.get_key_identities().unwrap().is_empty());

    service.set_backend_signing_key().unwrap();
    service.set_webserver_verification_key(&issuer.spki()).unwrap();
    let identities = service.get_key_identities().unwrap();
    assert_eq!(identities.webserver_public_key.as_deref(), Some(issuer.spki().as_str()));
    let backend = identities.backend_public_key.unwrap();

    assert_eq!(
        service.set_backend_signing_key().unwrap_err().kind(),
        ErrorKind::AlreadyExists
    );
    assert_eq!(
        service
            .set_webserver_verification_key(&Issuer::new().spki())
            .unwrap_err()
            .kind(),
        ErrorKind::AlreadyExists
    );
    assert_eq!(
        service.get_key_identities().unwrap().backend_public_key,
        Some(backend.clone())
    );

    service.clear_keys().unwrap();
    assert!(service.get_key_identities().unwrap().is_empty());
    service.set_backend_signing_key().unwrap();
    let fresh = service.get_key_identities().unwrap().backend_public_key.unwrap();
    assert_ne!(fresh, backend);
}

#[test]
fn authorized_keys_round_trip_through_the_service() {
    let service = DataRoomService::new(MemoryKvStore::new(), &ServiceConfig::default());
    let room = service.create_data_room(None).unwrap();
    let member = Issuer::new();

    service
        .update_data_room(&UpdateDataRoomInput::authorize_key(
            &room,
            KeyInput {
                key_id: "alice".into(),
                spki_public_key: member.spki(),
            },
        ))
        .unwrap();
    assert_eq!(
        service.authorized_key_id(&room, &member.spki()).unwrap().as_deref(),
        Some("alice")
    );
    assert_eq!(service.list_public_keys(&room).unwrap().len(), 1);

    let der_b64 = member.key.export_public_b64().unwrap();
    assert_eq!(
        service.authorized_key_id(&room, &der_b64).unwrap().as_deref(),
        Some("alice")
    );
    let duplicate = service.update_data_room(&UpdateDataRoomInput::authorize_key(
        &room,
        KeyInput {
            key_id: "bob".into(),
            spki_public_key: der_b64,
        },
    ));
    assert_eq!(duplicate.unwrap_err().kind(), ErrorKind::AlreadyExists);
    assert_eq!(service.list_public_keys(&room).unwrap().len(), 1);

    service
        .update_data_room(&UpdateDataRoomInput::revoke_key(&room, "alice"))
        .unwrap();
    assert!(service.list_public_keys(&room).unwrap().is_empty());
}

#[test]
fn expiry_is_enforced_only_when_configured() {
    let issuer = Issuer::new();
    let stale = NOW - 10 * 60 * 1000;

    let lenient = provisioned(MemoryKvStore::new(), &issuer)
        .with_clock(Arc::new(FixedClock::new(NOW)));
    let room = lenient.create_data_room(None).unwrap();
    lenient
        .update_data_room(&UpdateDataRoomInput::add_file(&room, issuer.file("a", b"a", stale)))
        .unwrap();

    let config = ServiceConfig {
        token_max_age_secs: Some(60),
        ..ServiceConfig::default()
    };
    let clock = Arc::new(FixedClock::new(NOW));
    let strict = DataRoomService::new(MemoryKvStore::new(), &config).with_clock(clock.clone());
    strict.set_webserver_verification_key(&issuer.spki()).unwrap();
    let room = strict.create_data_room(None).unwrap();

    let err = strict
        .update_data_room(&UpdateDataRoomInput::add_file(&room, issuer.file("a", b"a", stale)))
        .unwrap_err();
    assert!(err.to_string().contains("token has expired"));

    let future = NOW + 5 * 60 * 1000;
    let err = strict
        .update_data_room(&UpdateDataRoomInput::add_file(&room, issuer.file("b", b"b", future)))
        .unwrap_err();
    assert!(err.to_string().contains("token issued in the future"));

    strict
        .update_data_room(&UpdateDataRoomInput::add_file(&room, issuer.file("c", b"c", NOW - 1_000)))
        .unwrap();
    clock.advance_ms(120_000);
    let err = strict
        .update_data_room(&UpdateDataRoomInput::add_file(&room, issuer.file("d", b"d", NOW - 1_000)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert_eq!(strict.list_files(&room).unwrap(), vec!["c".to_string()]);
}

#[test]
fn sled_state_survives_reopen() {
    let dir = TempDir::new().expect("temp dir");
    let issuer = Issuer::new();
    let room;
    let backend;

    {
        let store = SledKvStore::open(dir.path()).expect("sled store");
        let service = provisioned(store, &issuer);
        room = service.create_data_room(Some("persisted")).unwrap();
        service
            .update_data_room(&UpdateDataRoomInput::add_file(
                &room,
                issuer.file("a.txt", b"persist me", NOW),
            ))
            .unwrap();
        service.update_data_room(&UpdateDataRoomInput::lock(&room)).unwrap();
        backend = service.get_key_identities().unwrap().backend_public_key;
        service.store().flush().unwrap();
    }

    let store = SledKvStore::open(dir.path()).expect("reopen");
    let service = DataRoomService::new(store, &ServiceConfig::default());
    assert_eq!(service.list_data_rooms().unwrap(), vec![room.clone()]);
    assert_eq!(service.list_files(&room).unwrap(), vec!["a.txt".to_string()]);
    assert_eq!(service.get_key_identities().unwrap().backend_public_key, backend);
    let signer = service.backend_signing_key().unwrap().expect("backend key");
    assert!(signer.can_sign());

    let add = service.update_data_room(&UpdateDataRoomInput::add_file(
        &room,
        issuer.file("b.txt", b"late", NOW),
    ));
    assert_eq!(add.unwrap_err().kind(), ErrorKind::InvalidState);
}
