//! ES5 source executed once at startup, before any user code. These install
//! the methods that are easier to express in the interpreted language than
//! natively; they are parsed with source locations stripped, which is what
//! lets `step()` run through them without surfacing micro-steps.

pub(crate) const POLYFILLS: &str = r#"
(function() {
  var defs = function(proto, name, value) {
    Object.defineProperty(proto, name, {
      configurable: true, enumerable: false, writable: true, value: value
    });
  };

  defs(Array.prototype, 'every', function(callbackfn, thisArg) {
    if (this == null || typeof callbackfn !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    for (var i = 0; i < len; i++) {
      if (i in t && !callbackfn.call(thisArg, t[i], i, t)) return false;
    }
    return true;
  });

  defs(Array.prototype, 'some', function(callbackfn, thisArg) {
    if (this == null || typeof callbackfn !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    for (var i = 0; i < len; i++) {
      if (i in t && callbackfn.call(thisArg, t[i], i, t)) return true;
    }
    return false;
  });

  defs(Array.prototype, 'forEach', function(callback, thisArg) {
    if (this == null || typeof callback !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    for (var i = 0; i < len; i++) {
      if (i in t) callback.call(thisArg, t[i], i, t);
    }
  });

  defs(Array.prototype, 'map', function(callback, thisArg) {
    if (this == null || typeof callback !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    var a = new Array(len);
    for (var i = 0; i < len; i++) {
      if (i in t) a[i] = callback.call(thisArg, t[i], i, t);
    }
    return a;
  });

  defs(Array.prototype, 'filter', function(fun, thisArg) {
    if (this == null || typeof fun !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    var res = [];
    for (var i = 0; i < len; i++) {
      if (i in t) {
        var val = t[i];
        if (fun.call(thisArg, val, i, t)) res.push(val);
      }
    }
    return res;
  });

  defs(Array.prototype, 'indexOf', function(searchElement, fromIndex) {
    if (this == null) throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    var n = fromIndex | 0;
    if (n < 0) n = len + n < 0 ? 0 : len + n;
    for (var i = n; i < len; i++) {
      if (i in t && t[i] === searchElement) return i;
    }
    return -1;
  });

  defs(Array.prototype, 'lastIndexOf', function(searchElement, fromIndex) {
    if (this == null) throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    var n = arguments.length > 1 ? fromIndex | 0 : len - 1;
    if (n < 0) n = len + n;
    if (n > len - 1) n = len - 1;
    for (var i = n; i >= 0; i--) {
      if (i in t && t[i] === searchElement) return i;
    }
    return -1;
  });

  defs(Array.prototype, 'reduce', function(callback, opt_initialValue) {
    if (this == null || typeof callback !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    var i = 0, value;
    if (arguments.length > 1) {
      value = opt_initialValue;
    } else {
      while (i < len && !(i in t)) i++;
      if (i >= len) throw new TypeError('Reduce of empty array with no initial value');
      value = t[i++];
    }
    for (; i < len; i++) {
      if (i in t) value = callback(value, t[i], i, t);
    }
    return value;
  });

  defs(Array.prototype, 'reduceRight', function(callback, opt_initialValue) {
    if (this == null || typeof callback !== 'function') throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    var i = len - 1, value;
    if (arguments.length > 1) {
      value = opt_initialValue;
    } else {
      while (i >= 0 && !(i in t)) i--;
      if (i < 0) throw new TypeError('Reduce of empty array with no initial value');
      value = t[i--];
    }
    for (; i >= 0; i--) {
      if (i in t) value = callback(value, t[i], i, t);
    }
    return value;
  });

  defs(Array.prototype, 'sort', function(opt_comp) {
    if (this == null) throw new TypeError();
    if (typeof opt_comp !== 'function') opt_comp = null;
    for (var i = 0; i < this.length; i++) {
      var changes = 0;
      for (var j = 0; j < this.length - i - 1; j++) {
        var a = this[j], b = this[j + 1];
        var swap;
        if (a === undefined) {
          swap = b !== undefined;
        } else if (b === undefined) {
          swap = false;
        } else if (opt_comp) {
          swap = opt_comp(a, b) > 0;
        } else {
          swap = String(a) > String(b);
        }
        if (swap) {
          this[j] = b;
          this[j + 1] = a;
          changes++;
        }
      }
      if (!changes) break;
    }
    return this;
  });

  defs(Array.prototype, 'toLocaleString', function() {
    if (this == null) throw new TypeError();
    var t = Object(this), len = t.length >>> 0;
    var out = [];
    for (var i = 0; i < len; i++) {
      out[i] = (t[i] === null || t[i] === undefined) ? '' : t[i].toLocaleString();
    }
    return out.join(',');
  });

  defs(Function.prototype, 'bind', function(oThis) {
    if (typeof this !== 'function') {
      throw new TypeError('What is trying to be bound is not callable');
    }
    var aArgs = Array.prototype.slice.call(arguments, 1),
        fToBind = this,
        fNOP = function() {},
        fBound = function() {
          return fToBind.apply(
              this instanceof fNOP ? this : oThis,
              aArgs.concat(Array.prototype.slice.call(arguments)));
        };
    if (this.prototype) {
      fNOP.prototype = this.prototype;
    }
    fBound.prototype = new fNOP();
    return fBound;
  });

  defs(Error.prototype, 'toString', function() {
    var name = this.name === undefined ? 'Error' : String(this.name);
    var message = this.message === undefined ? '' : String(this.message);
    if (!message) return name;
    if (!name) return message;
    return name + ': ' + message;
  });

  // The string half of replace-with-a-function lives in the interpreted
  // world; the regex half still runs through the native replace/exec.
  var replace_ = String.prototype.replace;
  defs(String.prototype, 'replace', function(substr, newSubstr) {
    if (typeof newSubstr !== 'function') {
      return replace_.call(this, substr, newSubstr);
    }
    var str = String(this);
    if (substr instanceof RegExp) {
      var subs = [];
      var m = substr.exec(str);
      while (m) {
        m.push(m.index, str);
        var inject = newSubstr.apply(undefined, m);
        subs.push([m.index, m[0].length, inject]);
        if (!substr.global) {
          m = null;
        } else {
          if (m[0].length === 0) substr.lastIndex++;
          m = substr.exec(str);
        }
      }
      for (var i = subs.length - 1; i >= 0; i--) {
        str = str.substring(0, subs[i][0]) + String(subs[i][2]) +
            str.substring(subs[i][0] + subs[i][1]);
      }
    } else {
      substr = String(substr);
      var i = str.indexOf(substr);
      if (i !== -1) {
        var inject = newSubstr(str.substr(i, substr.length), i, str);
        str = str.substring(0, i) + String(inject) +
            str.substring(i + substr.length);
      }
    }
    return str;
  });
})();
"#;
